//! Birdseye tile and metadata URL construction.

use crate::crawler::GridCell;
use crate::tile::TileKey;

/// Default tile host.
pub const DEFAULT_TILE_HOST: &str = "http://ak.t0.tiles.virtualearth.net/tiles";

/// Default imagery catalog prefix for tile names.
pub const DEFAULT_CATALOG_ID: &str = "o31311100030";

/// Default query string appended to every tile URL.
pub const DEFAULT_QUERY_SUFFIX: &str = "?g=5197";

/// Default REST host for metadata requests.
pub const DEFAULT_METADATA_HOST: &str = "http://dev.virtualearth.net/REST/V1";

/// Zoom level requested from the metadata service.
const METADATA_ZOOM_LEVEL: u8 = 20;

/// Detail level requested from the metadata service.
const METADATA_DETAIL_LEVEL: u8 = 2;

/// URL builder for the birdseye imagery service.
///
/// Tile URLs have the form
/// `{tile_host}/{catalog_id}-{imageId}-{zoom}-{tileIndex}{query_suffix}`;
/// metadata URLs query the birdseye metadata REST endpoint for one grid cell
/// and heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirdseyeEndpoints {
    tile_host: String,
    catalog_id: String,
    query_suffix: String,
    metadata_host: String,
    api_key: String,
}

impl Default for BirdseyeEndpoints {
    fn default() -> Self {
        Self {
            tile_host: DEFAULT_TILE_HOST.to_string(),
            catalog_id: DEFAULT_CATALOG_ID.to_string(),
            query_suffix: DEFAULT_QUERY_SUFFIX.to_string(),
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
            api_key: String::new(),
        }
    }
}

impl BirdseyeEndpoints {
    /// Set the tile host (no trailing slash needed).
    pub fn with_tile_host(mut self, host: impl Into<String>) -> Self {
        self.tile_host = host.into();
        self
    }

    /// Set the catalog id prefixed to every tile name.
    pub fn with_catalog_id(mut self, catalog_id: impl Into<String>) -> Self {
        self.catalog_id = catalog_id.into();
        self
    }

    /// Set the query suffix appended to tile URLs, including the leading `?`.
    pub fn with_query_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.query_suffix = suffix.into();
        self
    }

    /// Set the metadata REST host.
    pub fn with_metadata_host(mut self, host: impl Into<String>) -> Self {
        self.metadata_host = host.into();
        self
    }

    /// Set the API key sent with metadata requests.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// URL of one tile image.
    pub fn tile_url(&self, tile: TileKey) -> String {
        let image = tile.image();
        format!(
            "{}/{}-{}-{}-{}{}",
            self.tile_host.trim_end_matches('/'),
            self.catalog_id,
            image.image_id(),
            image.zoom(),
            tile.index(),
            self.query_suffix
        )
    }

    /// URL of the birdseye metadata document for one cell and heading.
    pub fn metadata_url(&self, cell: &GridCell) -> String {
        format!(
            "{}/Imagery/Metadata/Birdseye/{}?dir={}&key={}&zl={}&dl={}",
            self.metadata_host.trim_end_matches('/'),
            cell.coords(),
            cell.heading,
            self.api_key,
            METADATA_ZOOM_LEVEL,
            METADATA_DETAIL_LEVEL
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::ImageKey;

    #[test]
    fn test_default_tile_url() {
        let endpoints = BirdseyeEndpoints::default();
        let tile = ImageKey::new(123456, 20).unwrap().tile(17).unwrap();

        assert_eq!(
            endpoints.tile_url(tile),
            "http://ak.t0.tiles.virtualearth.net/tiles/o31311100030-123456-20-17?g=5197"
        );
    }

    #[test]
    fn test_custom_tile_host_strips_trailing_slash() {
        let endpoints = BirdseyeEndpoints::default()
            .with_tile_host("http://localhost:8080/")
            .with_catalog_id("cat")
            .with_query_suffix("");
        let tile = ImageKey::new(9, 2).unwrap().tile(3).unwrap();

        assert_eq!(endpoints.tile_url(tile), "http://localhost:8080/cat-9-2-3");
    }

    #[test]
    fn test_metadata_url() {
        let endpoints = BirdseyeEndpoints::default().with_api_key("KEY");
        let cell = GridCell {
            lat: -41.2725,
            lon: 174.785,
            heading: 135,
        };

        assert_eq!(
            endpoints.metadata_url(&cell),
            "http://dev.virtualearth.net/REST/V1/Imagery/Metadata/Birdseye/-41.272500,174.785000?dir=135&key=KEY&zl=20&dl=2"
        );
    }
}
