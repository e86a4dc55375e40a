//! Image and tile identities for the birdseye dataset.
//!
//! A birdseye *image* is a mosaic identified by an image id and a zoom
//! level ([`ImageKey`]). Each supported zoom level splits the mosaic into a
//! fixed number of tiles ([`TileKey`]) and, for the stitchable levels, a
//! fixed grid dimension handed to the mosaic tool.
//!
//! | zoom | tiles | grid |
//! |------|-------|------|
//! | 1    | 1     | -    |
//! | 2    | 4     | 2    |
//! | 3    | 16    | 4    |
//! | 19   | 47    | 8    |
//! | 20   | 192   | 16   |
//!
//! Any other zoom level is unsupported and rejected at construction.

mod error;
mod token;
mod types;
mod zoom;

pub use error::TileError;
pub use token::{parse_image_token, read_image_tokens};
pub use types::{ImageKey, ImageTiles, TileKey};
pub use zoom::{grid_dimension_for_zoom, tiles_for_zoom, DEFAULT_ZOOM, SUPPORTED_ZOOMS};
