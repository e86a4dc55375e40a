//! Image and tile key types.

use std::fmt;

use super::error::TileError;
use super::zoom::{grid_dimension_for_zoom, tiles_for_zoom};

/// Identifies one downloadable mosaic: an image id at a zoom level.
///
/// Construction validates the zoom level, so every `ImageKey` in circulation
/// has a defined tile count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey {
    image_id: u64,
    zoom: u8,
}

impl ImageKey {
    /// Creates a key, rejecting a zero image id or an unsupported zoom.
    pub fn new(image_id: u64, zoom: u8) -> Result<Self, TileError> {
        if image_id == 0 {
            return Err(TileError::ZeroImageId);
        }
        if tiles_for_zoom(zoom).is_none() {
            return Err(TileError::UnsupportedZoom(zoom));
        }
        Ok(Self { image_id, zoom })
    }

    /// The image id.
    #[inline]
    pub fn image_id(&self) -> u64 {
        self.image_id
    }

    /// The zoom level.
    #[inline]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of tiles making up this image.
    pub fn tile_count(&self) -> u32 {
        // Zoom validated in `new`.
        tiles_for_zoom(self.zoom).unwrap_or(0)
    }

    /// Grid dimension for the mosaic tool, `None` for unstitchable zooms.
    pub fn grid_dimension(&self) -> Option<u32> {
        grid_dimension_for_zoom(self.zoom)
    }

    /// Returns the tile at `index`.
    pub fn tile(&self, index: u32) -> Result<TileKey, TileError> {
        let count = self.tile_count();
        if index >= count {
            return Err(TileError::TileOutOfRange {
                zoom: self.zoom,
                index,
                count,
            });
        }
        Ok(TileKey { image: *self, index })
    }

    /// Iterates every tile of this image in index order.
    #[inline]
    pub fn tiles(&self) -> ImageTiles {
        ImageTiles {
            image: *self,
            next: 0,
            count: self.tile_count(),
        }
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.image_id, self.zoom)
    }
}

/// One tile of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    image: ImageKey,
    index: u32,
}

impl TileKey {
    /// The image this tile belongs to.
    #[inline]
    pub fn image(&self) -> ImageKey {
        self.image
    }

    /// Tile index within the image, `0..tile_count`.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:03}", self.image, self.index)
    }
}

/// Iterator over the tiles of one image.
#[derive(Debug, Clone)]
pub struct ImageTiles {
    image: ImageKey,
    next: u32,
    count: u32,
}

impl Iterator for ImageTiles {
    type Item = TileKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let tile = TileKey {
            image: self.image,
            index: self.next,
        };
        self.next += 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ImageTiles {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_zero_id() {
        assert_eq!(ImageKey::new(0, 20), Err(TileError::ZeroImageId));
    }

    #[test]
    fn test_new_rejects_unsupported_zoom() {
        assert_eq!(ImageKey::new(42, 18), Err(TileError::UnsupportedZoom(18)));
    }

    #[test]
    fn test_tile_count_and_grid() {
        let key = ImageKey::new(12345, 20).unwrap();
        assert_eq!(key.tile_count(), 192);
        assert_eq!(key.grid_dimension(), Some(16));

        let single = ImageKey::new(12345, 1).unwrap();
        assert_eq!(single.tile_count(), 1);
        assert_eq!(single.grid_dimension(), None);
    }

    #[test]
    fn test_tiles_iterator_covers_all_indices() {
        let key = ImageKey::new(7, 19).unwrap();
        let tiles: Vec<_> = key.tiles().collect();

        assert_eq!(tiles.len(), 47);
        assert_eq!(key.tiles().len(), 47);
        assert_eq!(tiles.first().unwrap().index(), 0);
        assert_eq!(tiles.last().unwrap().index(), 46);
        assert!(tiles.iter().all(|t| t.image() == key));
    }

    #[test]
    fn test_tile_out_of_range() {
        let key = ImageKey::new(7, 2).unwrap();
        assert!(key.tile(3).is_ok());
        assert_eq!(
            key.tile(4),
            Err(TileError::TileOutOfRange {
                zoom: 2,
                index: 4,
                count: 4
            })
        );
    }

    #[test]
    fn test_display() {
        let key = ImageKey::new(991, 3).unwrap();
        assert_eq!(key.to_string(), "991-3");
        assert_eq!(key.tile(5).unwrap().to_string(), "991-3/005");
    }
}
