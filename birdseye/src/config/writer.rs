//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let api_key = config.metadata.api_key.as_deref().unwrap_or("");

    format!(
        r#"[dataset]
; Root directory of the dataset. Zoom directories ({{zoom}}/{{imageId}}/tile-NNN.jpg),
; combined mosaics, metadata and run reports all live here.
root = {}

[crawl]
; Bounding box crawled for birdseye metadata, in degrees.
; Corners may be given in any order.
min_lat = {}
min_lon = {}
max_lat = {}
max_lon = {}
; Grid step in degrees. Every cell is queried for 8 headings (0, 45, ... 315).
step_lat = {}
step_lon = {}
; Maximum metadata requests in flight (default: 50)
max_metadata_in_flight = {}

[metadata]
; Birdseye metadata REST host
host = {}
; API key appended to every metadata request
api_key = {}

[tiles]
; Tile URLs are {{host}}/{{catalog_id}}-{{imageId}}-{{zoom}}-{{tile}}{{query_suffix}}
host = {}
catalog_id = {}
query_suffix = {}

[download]
; Maximum tile downloads in flight (default: 100)
max_concurrent = {}
; Tiles smaller than this many bytes are treated as corrupt and
; downloaded again (default: 100)
min_tile_bytes = {}
; Timeout in seconds for HTTP requests (default: 30)
timeout = {}
; Defer new image downloads while this many stitch jobs are queued
; (default: 1, 0 disables)
max_pending_stitch = {}

[mosaic]
; Mosaic tool, run from the dataset root with the argument "{{zoom}}\{{imageId}} {{grid}}"
; Relative paths are resolved against the dataset root.
tool = {}
; Number of mosaic tool runs allowed at once (default: 4)
workers = {}

[logging]
; Log file, truncated at the start of every session
file = {}
"#,
        path_to_string(&config.dataset.root),
        config.crawl.min_lat,
        config.crawl.min_lon,
        config.crawl.max_lat,
        config.crawl.max_lon,
        config.crawl.step_lat,
        config.crawl.step_lon,
        config.crawl.max_metadata_in_flight,
        config.metadata.host,
        api_key,
        config.tiles.host,
        config.tiles.catalog_id,
        config.tiles.query_suffix,
        config.download.max_concurrent,
        config.download.min_tile_bytes,
        config.download.timeout,
        config.download.max_pending_stitch,
        path_to_string(&config.mosaic.tool),
        config.mosaic.workers,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
