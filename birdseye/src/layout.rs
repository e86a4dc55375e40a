//! On-disk layout of a birdseye dataset.
//!
//! ```text
//! {root}/
//! ├── {zoom}/
//! │   ├── {imageId}/tile-{NNN}.jpg     tiles of stitchable zooms
//! │   ├── {imageId}.jpg                combined mosaic
//! │   └── {imageId}-{NNN}.jpg          zoom 1 only (single tile)
//! ├── tmp/{zoom}-{imageId}-{NNN}.jpg   in-flight downloads
//! ├── metadata/
//! │   ├── list.txt                     metadata index of this run
//! │   ├── json/{imageId}.json          raw metadata documents
//! │   └── old/{list,metadataGeo}/      previous runs' artifacts
//! ├── metadataGeo.txt                  geolocation log
//! ├── missingTiles.txt                 incomplete image directories
//! └── errors.txt                       free-text error log
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::tile::{ImageKey, TileKey};

/// Resolves every path of the dataset from its root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    /// Creates a layout rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Dataset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every image of one zoom level.
    pub fn zoom_dir(&self, zoom: u8) -> PathBuf {
        self.root.join(zoom.to_string())
    }

    /// Directory holding the tiles of one image.
    ///
    /// Zoom 1 images have no directory of their own; their single tile lives
    /// directly in the zoom directory.
    pub fn image_dir(&self, image: ImageKey) -> PathBuf {
        self.zoom_dir(image.zoom()).join(image.image_id().to_string())
    }

    /// Directory a tile file is written into.
    pub fn tile_dir(&self, tile: TileKey) -> PathBuf {
        let image = tile.image();
        if image.zoom() > 1 {
            self.image_dir(image)
        } else {
            self.zoom_dir(image.zoom())
        }
    }

    /// Final path of a tile file.
    pub fn tile_path(&self, tile: TileKey) -> PathBuf {
        let image = tile.image();
        if image.zoom() > 1 {
            self.image_dir(image)
                .join(format!("tile-{:03}.jpg", tile.index()))
        } else {
            self.zoom_dir(image.zoom())
                .join(format!("{}-{:03}.jpg", image.image_id(), tile.index()))
        }
    }

    /// Temp directory for in-flight downloads.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Temp path a tile is downloaded to before being renamed into place.
    pub fn tmp_tile_path(&self, tile: TileKey) -> PathBuf {
        let image = tile.image();
        self.tmp_dir().join(format!(
            "{}-{}-{:03}.jpg",
            image.zoom(),
            image.image_id(),
            tile.index()
        ))
    }

    /// Path of the combined mosaic produced by the mosaic tool.
    pub fn mosaic_path(&self, image: ImageKey) -> PathBuf {
        self.zoom_dir(image.zoom())
            .join(format!("{}.jpg", image.image_id()))
    }

    /// Image directory relative to the root, as passed to the mosaic tool.
    ///
    /// The tool expects a backslash separator regardless of host platform.
    pub fn relative_image_dir(image: ImageKey) -> String {
        format!("{}\\{}", image.zoom(), image.image_id())
    }

    /// Directory for metadata artifacts.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Directory holding raw metadata documents.
    pub fn metadata_json_dir(&self) -> PathBuf {
        self.metadata_dir().join("json")
    }

    /// Raw metadata document of one image.
    pub fn metadata_json_path(&self, image_id: u64) -> PathBuf {
        self.metadata_json_dir().join(format!("{}.json", image_id))
    }

    /// Metadata index of the current run.
    pub fn metadata_index_path(&self) -> PathBuf {
        self.metadata_dir().join("list.txt")
    }

    /// Where previous metadata indexes are archived.
    pub fn metadata_index_archive_dir(&self) -> PathBuf {
        self.metadata_dir().join("old").join("list")
    }

    /// Geolocation log of the current run.
    pub fn geolocation_log_path(&self) -> PathBuf {
        self.root.join("metadataGeo.txt")
    }

    /// Where previous geolocation logs are archived.
    pub fn geolocation_archive_dir(&self) -> PathBuf {
        self.metadata_dir().join("old").join("metadataGeo")
    }

    /// Missing-tiles report.
    pub fn missing_tiles_path(&self) -> PathBuf {
        self.root.join("missingTiles.txt")
    }

    /// Free-text errors log.
    pub fn errors_log_path(&self) -> PathBuf {
        self.root.join("errors.txt")
    }

    /// Creates the directory skeleton and resets the temp directory.
    ///
    /// Failures here are fatal for a run: nothing downstream can persist
    /// anything without these directories.
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.metadata_json_dir())?;
        std::fs::create_dir_all(self.metadata_index_archive_dir())?;
        std::fs::create_dir_all(self.geolocation_archive_dir())?;

        let tmp = self.tmp_dir();
        match std::fs::remove_dir_all(&tmp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        std::fs::create_dir_all(&tmp)
    }
}
