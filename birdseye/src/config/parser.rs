//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [dataset] section
    if let Some(section) = ini.section(Some("dataset")) {
        if let Some(v) = section.get("root") {
            let v = v.trim();
            if !v.is_empty() {
                config.dataset.root = expand_tilde(v);
            }
        }
    }

    // [crawl] section
    if let Some(section) = ini.section(Some("crawl")) {
        let coordinates = [
            ("min_lat", &mut config.crawl.min_lat, 90.0),
            ("max_lat", &mut config.crawl.max_lat, 90.0),
            ("min_lon", &mut config.crawl.min_lon, 180.0),
            ("max_lon", &mut config.crawl.max_lon, 180.0),
        ];
        for (key, field, limit) in coordinates {
            if let Some(v) = section.get(key) {
                let parsed: f64 = parse_value("crawl", key, v, "must be a number (degrees)")?;
                if !(-limit..=limit).contains(&parsed) {
                    return Err(invalid(
                        "crawl",
                        key,
                        v,
                        &format!("must be between -{} and {}", limit, limit),
                    ));
                }
                *field = parsed;
            }
        }
        for (key, field) in [
            ("step_lat", &mut config.crawl.step_lat),
            ("step_lon", &mut config.crawl.step_lon),
        ] {
            if let Some(v) = section.get(key) {
                let parsed: f64 = parse_value("crawl", key, v, "must be a number (degrees)")?;
                if parsed.is_nan() || parsed <= 0.0 {
                    return Err(invalid("crawl", key, v, "must be greater than zero"));
                }
                *field = parsed;
            }
        }
        if let Some(v) = section.get("max_metadata_in_flight") {
            config.crawl.max_metadata_in_flight =
                parse_positive("crawl", "max_metadata_in_flight", v)?;
        }
    }

    // [metadata] section
    if let Some(section) = ini.section(Some("metadata")) {
        if let Some(v) = section.get("host") {
            let v = v.trim();
            if !v.is_empty() {
                config.metadata.host = v.to_string();
            }
        }
        if let Some(v) = section.get("api_key") {
            let v = v.trim();
            if !v.is_empty() {
                config.metadata.api_key = Some(v.to_string());
            }
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("host") {
            let v = v.trim();
            if !v.is_empty() {
                config.tiles.host = v.to_string();
            }
        }
        if let Some(v) = section.get("catalog_id") {
            let v = v.trim();
            if !v.is_empty() {
                config.tiles.catalog_id = v.to_string();
            }
        }
        if let Some(v) = section.get("query_suffix") {
            config.tiles.query_suffix = v.trim().to_string();
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("max_concurrent") {
            config.download.max_concurrent = parse_positive("download", "max_concurrent", v)?;
        }
        if let Some(v) = section.get("min_tile_bytes") {
            config.download.min_tile_bytes = parse_value(
                "download",
                "min_tile_bytes",
                v,
                "must be a non-negative integer (bytes)",
            )?;
        }
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_value(
                "download",
                "timeout",
                v,
                "must be a positive integer (seconds)",
            )?;
            if config.download.timeout == 0 {
                return Err(invalid(
                    "download",
                    "timeout",
                    v,
                    "must be a positive integer (seconds)",
                ));
            }
        }
        if let Some(v) = section.get("max_pending_stitch") {
            config.download.max_pending_stitch = parse_value(
                "download",
                "max_pending_stitch",
                v,
                "must be a non-negative integer (0 disables)",
            )?;
        }
    }

    // [mosaic] section
    if let Some(section) = ini.section(Some("mosaic")) {
        if let Some(v) = section.get("tool") {
            let v = v.trim();
            if !v.is_empty() {
                config.mosaic.tool = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("workers") {
            config.mosaic.workers = parse_positive("mosaic", "workers", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    match parse_value::<usize>(section, key, value, "must be a positive integer")? {
        0 => Err(invalid(section, key, value, "must be a positive integer")),
        n => Ok(n),
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
