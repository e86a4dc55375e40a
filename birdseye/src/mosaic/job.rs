//! Stitch jobs.

use std::fmt;

use crate::layout::DatasetLayout;
use crate::tile::ImageKey;

/// One mosaic tool invocation: combine the tiles of an image directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchJob {
    image: ImageKey,
    directory: String,
    grid_dimension: u32,
}

impl StitchJob {
    /// Builds the job for `image`.
    ///
    /// Returns `None` for zoom levels without a stitch grid (zoom 1).
    pub fn for_image(image: ImageKey) -> Option<Self> {
        let grid_dimension = image.grid_dimension()?;
        Some(Self {
            image,
            directory: DatasetLayout::relative_image_dir(image),
            grid_dimension,
        })
    }

    pub fn image(&self) -> ImageKey {
        self.image
    }

    /// Image directory relative to the dataset root, `{zoom}\{imageId}`.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Tiles per side of the mosaic grid.
    pub fn grid_dimension(&self) -> u32 {
        self.grid_dimension
    }

    /// The single argument handed to the mosaic tool.
    pub fn argument(&self) -> String {
        format!("{} {}", self.directory, self.grid_dimension)
    }
}

impl fmt::Display for StitchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argument())
    }
}
