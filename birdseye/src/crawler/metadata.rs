//! Birdseye metadata document parsing.
//!
//! The metadata service answers with a REST envelope whose first resource
//! describes the birdseye image covering the queried cell and heading:
//!
//! ```json
//! {
//!   "resourceSets": [{
//!     "resources": [{
//!       "imageUrl": "http://.../tiles/cat-123456-20-{tileId}?g=5197",
//!       "bes": {
//!         "bec": { "qcx": .., "qcy": .., "qcz": ..,
//!                  "qdx": .., "qdy": .., "qdz": ..,
//!                  "qex": .., "qey": .., "qez": ..,
//!                  "ol": 120.5, "olt": -41.27, "olg": 174.78 },
//!         "bei": { "pcd": "2013-05-17T00:00:00" }
//!       }
//!     }]
//!   }]
//! }
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while interpreting a metadata document.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("malformed metadata document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata document has no resource")]
    NoResource,

    #[error("image URL does not contain a zoom-20 image id: {0}")]
    UnmatchedImageUrl(String),

    #[error("image id {0} is not a positive integer")]
    InvalidImageId(String),
}

/// Camera pose vectors in earth-centred coordinates.
///
/// Consumed by the pose exporter, which converts them into a local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Camera position.
    pub position: [f64; 3],
    /// Forward direction.
    pub forward: [f64; 3],
    /// Up direction.
    pub up: [f64; 3],
}

/// A discovered birdseye image and its geolocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub image_id: u64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    /// Capture time as reported by the service.
    pub capture_time: String,
    pub pose: CameraPose,
}

impl MetadataRecord {
    /// Parses a metadata response body.
    pub fn parse(body: &[u8]) -> Result<Self, MetadataError> {
        let document: MetadataDocument = serde_json::from_slice(body)?;
        let resource = document
            .resource_sets
            .into_iter()
            .next()
            .and_then(|set| set.resources.into_iter().next())
            .ok_or(MetadataError::NoResource)?;

        let image_id = image_id_from_url(&resource.image_url)?;
        let bec = resource.bes.bec;

        Ok(Self {
            image_id,
            lat: bec.olt,
            lon: bec.olg,
            alt: bec.ol,
            capture_time: resource.bes.bei.pcd,
            pose: CameraPose {
                position: [bec.qcx, bec.qcy, bec.qcz],
                forward: [bec.qdx, bec.qdy, bec.qdz],
                up: [bec.qex, bec.qey, bec.qez],
            },
        })
    }

    /// Geolocation log row: `{imageId}.jpg,lat,lon,alt,captureTime`.
    pub fn geolocation_row(&self) -> [String; 5] {
        [
            format!("{}.jpg", self.image_id),
            self.lat.to_string(),
            self.lon.to_string(),
            self.alt.to_string(),
            self.capture_time.clone(),
        ]
    }
}

/// Extracts the zoom-20 image id from a tile URL template.
pub fn image_id_from_url(url: &str) -> Result<u64, MetadataError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"-([0-9]{1,6})-20-").expect("valid image id regex"));

    let digits = pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| MetadataError::UnmatchedImageUrl(url.to_string()))?;

    match digits.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(MetadataError::InvalidImageId(digits.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    #[serde(rename = "resourceSets", default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Deserialize)]
struct ResourceSet {
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "imageUrl")]
    image_url: String,
    bes: Bes,
}

#[derive(Debug, Deserialize)]
struct Bes {
    bec: Bec,
    bei: Bei,
}

#[derive(Debug, Deserialize)]
struct Bec {
    qcx: f64,
    qcy: f64,
    qcz: f64,
    qdx: f64,
    qdy: f64,
    qdz: f64,
    qex: f64,
    qey: f64,
    qez: f64,
    ol: f64,
    olt: f64,
    olg: f64,
}

#[derive(Debug, Deserialize)]
struct Bei {
    pcd: String,
}

/// Builds a well-formed metadata document for tests.
#[cfg(test)]
pub(crate) fn sample_document(image_id: u64) -> String {
    serde_json::json!({
        "resourceSets": [{
            "resources": [{
                "imageUrl": format!(
                    "http://ak.t0.tiles.virtualearth.net/tiles/o31311100030-{}-20-{{tileId}}?g=5197",
                    image_id
                ),
                "bes": {
                    "bec": {
                        "qcx": -4780000.5, "qcy": 435000.25, "qcz": -4190000.0,
                        "qdx": 0.1, "qdy": 0.2, "qdz": -0.9,
                        "qex": 0.0, "qey": 1.0, "qez": 0.0,
                        "ol": 412.5, "olt": -41.2731, "olg": 174.7842
                    },
                    "bei": { "pcd": "2013-05-17T10:21:00" }
                }
            }]
        }]
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let record = MetadataRecord::parse(sample_document(123456).as_bytes()).unwrap();

        assert_eq!(record.image_id, 123456);
        assert_eq!(record.lat, -41.2731);
        assert_eq!(record.lon, 174.7842);
        assert_eq!(record.alt, 412.5);
        assert_eq!(record.capture_time, "2013-05-17T10:21:00");
        assert_eq!(record.pose.forward, [0.1, 0.2, -0.9]);
        assert_eq!(record.pose.up, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_geolocation_row() {
        let record = MetadataRecord::parse(sample_document(77).as_bytes()).unwrap();
        assert_eq!(
            record.geolocation_row(),
            [
                "77.jpg".to_string(),
                "-41.2731".to_string(),
                "174.7842".to_string(),
                "412.5".to_string(),
                "2013-05-17T10:21:00".to_string()
            ]
        );
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            MetadataRecord::parse(b"not json"),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn test_empty_resource_sets() {
        assert!(matches!(
            MetadataRecord::parse(br#"{"resourceSets":[]}"#),
            Err(MetadataError::NoResource)
        ));
        assert!(matches!(
            MetadataRecord::parse(br#"{"resourceSets":[{"resources":[]}]}"#),
            Err(MetadataError::NoResource)
        ));
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_document(5)).unwrap();
        value["resourceSets"][0]["resources"][0]["bes"]["bec"]
            .as_object_mut()
            .unwrap()
            .remove("olt");

        let body = value.to_string();
        assert!(matches!(
            MetadataRecord::parse(body.as_bytes()),
            Err(MetadataError::Json(_))
        ));
    }

    #[test]
    fn test_image_id_from_url() {
        assert_eq!(
            image_id_from_url("http://host/tiles/cat-987654-20-{tileId}").unwrap(),
            987654
        );
        assert!(matches!(
            image_id_from_url("http://host/tiles/cat-987654-19-{tileId}"),
            Err(MetadataError::UnmatchedImageUrl(_))
        ));
        assert!(matches!(
            image_id_from_url("http://host/tiles/cat-0-20-{tileId}"),
            Err(MetadataError::InvalidImageId(_))
        ));
    }
}
