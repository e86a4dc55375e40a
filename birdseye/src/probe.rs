//! Filesystem probe: the single source of truth for dataset progress.
//!
//! Whether a tile is downloaded and whether a mosaic is current is always
//! derived from disk, never from in-memory bookkeeping. This is what makes
//! runs resumable: a restarted process re-derives everything it needs from
//! file sizes and modification times.
//!
//! Tile files only ever appear under their final name through
//! [`FilesystemProbe::write_tile`], which writes into the temp directory and
//! renames into place, so readers never observe a partial tile.

use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::trace;

use crate::layout::DatasetLayout;
use crate::tile::{ImageKey, TileKey};

/// Default size below which a tile file is treated as corrupt.
pub const DEFAULT_MIN_TILE_BYTES: u64 = 100;

/// Snapshot of one image directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Tile files at or above the corruption threshold.
    pub valid_tiles: u32,
    /// Newest modification time among all tile files in the directory.
    pub newest_tile: Option<SystemTime>,
    /// Modification time of the combined mosaic, if one exists.
    pub mosaic_modified: Option<SystemTime>,
}

/// Completeness of an image as judged from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    /// The image directory does not exist.
    MissingDirectory,
    /// Fewer valid tiles than the zoom level requires.
    Incomplete { found: u32, expected: u32 },
    /// All tiles present but the mosaic is at least as new as every tile.
    UpToDate,
    /// All tiles present and newer than any existing mosaic.
    NeedsStitch,
}

/// Reads tile and mosaic state from the dataset directory.
#[derive(Debug, Clone)]
pub struct FilesystemProbe {
    layout: DatasetLayout,
    min_tile_bytes: u64,
}

impl FilesystemProbe {
    /// Creates a probe over `layout` with the given corruption threshold.
    pub fn new(layout: DatasetLayout, min_tile_bytes: u64) -> Self {
        Self {
            layout,
            min_tile_bytes,
        }
    }

    /// The dataset layout this probe reads.
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// The corruption threshold in bytes.
    pub fn min_tile_bytes(&self) -> u64 {
        self.min_tile_bytes
    }

    /// Returns `true` if the tile is missing or smaller than the threshold.
    pub async fn tile_needs_download(&self, tile: TileKey) -> bool {
        match tokio::fs::metadata(self.layout.tile_path(tile)).await {
            Ok(meta) => !meta.is_file() || meta.len() < self.min_tile_bytes,
            Err(_) => true,
        }
    }

    /// Writes a downloaded tile: temp file first, then an atomic rename.
    pub async fn write_tile(&self, tile: TileKey, data: &[u8]) -> io::Result<()> {
        let tmp_path = self.layout.tmp_tile_path(tile);
        let final_path = self.layout.tile_path(tile);

        tokio::fs::create_dir_all(self.layout.tmp_dir()).await?;
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::create_dir_all(self.layout.tile_dir(tile)).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        trace!(tile = %tile, bytes = data.len(), "Tile written");
        Ok(())
    }

    /// Scans an image directory. Returns `None` if it does not exist.
    ///
    /// Only the image's own tile names are looked at; any other file in the
    /// directory is ignored.
    pub fn scan_image(&self, image: ImageKey) -> io::Result<Option<DirectoryScan>> {
        let dir = self.layout.image_dir(image);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut valid_tiles = 0u32;
        let mut newest_tile: Option<SystemTime> = None;

        for tile in image.tiles() {
            let meta = match std::fs::metadata(self.layout.tile_path(tile)) {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if meta.len() >= self.min_tile_bytes {
                valid_tiles += 1;
            }
            if let Ok(modified) = meta.modified() {
                newest_tile = Some(newest_tile.map_or(modified, |n| n.max(modified)));
            }
        }

        let mosaic_modified = std::fs::metadata(self.layout.mosaic_path(image))
            .and_then(|m| m.modified())
            .ok();

        Ok(Some(DirectoryScan {
            valid_tiles,
            newest_tile,
            mosaic_modified,
        }))
    }

    /// Judges whether an image is complete and whether its mosaic is stale.
    pub fn completeness(&self, image: ImageKey) -> io::Result<Completeness> {
        let Some(scan) = self.scan_image(image)? else {
            return Ok(Completeness::MissingDirectory);
        };

        let expected = image.tile_count();
        if scan.valid_tiles != expected {
            return Ok(Completeness::Incomplete {
                found: scan.valid_tiles,
                expected,
            });
        }

        let stale = match (scan.newest_tile, scan.mosaic_modified) {
            (_, None) => true,
            (Some(tile), Some(mosaic)) => tile > mosaic,
            (None, Some(_)) => false,
        };

        Ok(if stale {
            Completeness::NeedsStitch
        } else {
            Completeness::UpToDate
        })
    }

    /// Lists zoom levels that have a directory under the root, ascending.
    pub fn zoom_levels(&self) -> io::Result<Vec<u8>> {
        let mut zooms = numeric_subdirs(self.layout.root())?
            .into_iter()
            .filter_map(|n| u8::try_from(n).ok())
            .collect::<Vec<_>>();
        zooms.sort_unstable();
        Ok(zooms)
    }

    /// Lists image ids that have a directory under the zoom directory, ascending.
    pub fn image_ids(&self, zoom: u8) -> io::Result<Vec<u64>> {
        let dir = self.layout.zoom_dir(zoom);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = numeric_subdirs(&dir)?;
        ids.sort_unstable();
        Ok(ids)
    }
}

fn numeric_subdirs(dir: &Path) -> io::Result<Vec<u64>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            out.push(n);
        }
    }
    Ok(out)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FilesystemProbe) {
        let temp = TempDir::new().unwrap();
        let layout = DatasetLayout::new(temp.path());
        layout.prepare().unwrap();
        (temp, FilesystemProbe::new(layout, DEFAULT_MIN_TILE_BYTES))
    }

    fn key(id: u64, zoom: u8) -> ImageKey {
        ImageKey::new(id, zoom).unwrap()
    }

    #[tokio::test]
    async fn test_missing_tile_needs_download() {
        let (_temp, probe) = setup();
        let tile = key(1, 20).tile(0).unwrap();
        assert!(probe.tile_needs_download(tile).await);
    }

    #[tokio::test]
    async fn test_undersized_tile_needs_download() {
        let (_temp, probe) = setup();
        let tile = key(1, 20).tile(3).unwrap();
        let path = probe.layout().tile_path(tile);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        std::fs::write(&path, vec![0u8; 99]).unwrap();
        assert!(probe.tile_needs_download(tile).await);

        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(!probe.tile_needs_download(tile).await);
    }

    #[tokio::test]
    async fn test_write_tile_is_atomic() {
        let (_temp, probe) = setup();
        let tile = key(9, 3).tile(15).unwrap();

        probe.write_tile(tile, &[1u8; 300]).await.unwrap();

        let written = std::fs::read(probe.layout().tile_path(tile)).unwrap();
        assert_eq!(written.len(), 300);
        assert!(!probe.layout().tmp_tile_path(tile).exists());
    }

    #[test]
    fn test_completeness_missing_directory() {
        let (_temp, probe) = setup();
        assert_eq!(
            probe.completeness(key(5, 2)).unwrap(),
            Completeness::MissingDirectory
        );
    }

    #[test]
    fn test_completeness_incomplete() {
        let (_temp, probe) = setup();
        let image = key(5, 20);
        write_tiles(probe.layout(), image, 190, hours_ago(1));

        assert_eq!(
            probe.completeness(image).unwrap(),
            Completeness::Incomplete {
                found: 190,
                expected: 192
            }
        );
    }

    #[test]
    fn test_corrupt_tiles_are_not_counted() {
        let (_temp, probe) = setup();
        let image = key(5, 2);
        write_tiles(probe.layout(), image, 4, hours_ago(1));
        std::fs::write(probe.layout().tile_path(image.tile(2).unwrap()), b"x").unwrap();

        assert_eq!(
            probe.completeness(image).unwrap(),
            Completeness::Incomplete {
                found: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn test_stray_jpeg_does_not_stand_in_for_missing_tile() {
        let (_temp, probe) = setup();
        let image = key(5, 20);
        write_tiles(probe.layout(), image, 191, hours_ago(1));
        let dir = probe.layout().image_dir(image);
        std::fs::write(dir.join("preview.jpg"), vec![0xCD; 500]).unwrap();
        std::fs::write(dir.join("tile-192.jpg"), vec![0xCD; 500]).unwrap();

        assert!(!probe.layout().tile_path(image.tile(191).unwrap()).exists());
        assert_eq!(
            probe.completeness(image).unwrap(),
            Completeness::Incomplete {
                found: 191,
                expected: 192
            }
        );
    }

    #[test]
    fn test_completeness_needs_stitch_without_mosaic() {
        let (_temp, probe) = setup();
        let image = key(5, 2);
        write_tiles(probe.layout(), image, 4, hours_ago(1));
        assert_eq!(probe.completeness(image).unwrap(), Completeness::NeedsStitch);
    }

    #[test]
    fn test_completeness_up_to_date_when_mosaic_newer() {
        let (_temp, probe) = setup();
        let image = key(5, 2);
        write_tiles(probe.layout(), image, 4, hours_ago(3));
        write_mosaic(probe.layout(), image, hours_ago(1));
        assert_eq!(probe.completeness(image).unwrap(), Completeness::UpToDate);
    }

    #[test]
    fn test_completeness_stale_mosaic() {
        let (_temp, probe) = setup();
        let image = key(5, 2);
        write_mosaic(probe.layout(), image, hours_ago(3));
        write_tiles(probe.layout(), image, 4, hours_ago(1));
        assert_eq!(probe.completeness(image).unwrap(), Completeness::NeedsStitch);
    }

    #[test]
    fn test_lists_zoom_levels_and_images() {
        let (_temp, probe) = setup();
        write_tiles(probe.layout(), key(30, 20), 1, hours_ago(1));
        write_tiles(probe.layout(), key(10, 20), 1, hours_ago(1));
        write_tiles(probe.layout(), key(7, 3), 1, hours_ago(1));

        assert_eq!(probe.zoom_levels().unwrap(), vec![3, 20]);
        assert_eq!(probe.image_ids(20).unwrap(), vec![10, 30]);
        assert!(probe.image_ids(19).unwrap().is_empty());
    }
}
