//! Zoom level tables.

/// Zoom level used when an input token or a metadata discovery names none.
pub const DEFAULT_ZOOM: u8 = 20;

/// Every zoom level with a defined tile count, ascending.
pub const SUPPORTED_ZOOMS: [u8; 5] = [1, 2, 3, 19, 20];

/// Number of tiles making up one image at `zoom`.
///
/// Returns `None` for unsupported zoom levels.
pub fn tiles_for_zoom(zoom: u8) -> Option<u32> {
    match zoom {
        1 => Some(1),
        2 => Some(4),
        3 => Some(16),
        19 => Some(47),
        20 => Some(192),
        _ => None,
    }
}

/// Grid dimension passed to the mosaic tool for images at `zoom`.
///
/// Zoom 1 images are a single tile and are never stitched, so they have no
/// grid dimension.
pub fn grid_dimension_for_zoom(zoom: u8) -> Option<u32> {
    match zoom {
        2 => Some(2),
        3 => Some(4),
        19 => Some(8),
        20 => Some(16),
        _ => None,
    }
}
