//! Error types for image and tile identities.

use thiserror::Error;

/// Errors produced when building or parsing image identities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Image ids are strictly positive.
    #[error("image id must be positive")]
    ZeroImageId,

    /// The zoom level has no defined tile count.
    #[error("zoom level {0} is not supported")]
    UnsupportedZoom(u8),

    /// Tile index beyond the tile count of the zoom level.
    #[error("tile {index} out of range for zoom {zoom} ({count} tiles)")]
    TileOutOfRange { zoom: u8, index: u32, count: u32 },

    /// An input token could not be parsed as `imageId[-zoom]`.
    #[error("invalid image token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },
}
