//! Birdseye metadata discovery.
//!
//! The crawler covers a bounding box with a square spiral of grid points,
//! starting at the box midpoint, and queries the metadata service for each
//! point at eight compass headings. Every distinct image id it finds is
//! scheduled for download at zoom 20.

mod crawl;
mod metadata;
mod spiral;

pub use crawl::MetadataCrawler;
pub use metadata::{image_id_from_url, CameraPose, MetadataError, MetadataRecord};
pub use spiral::{BoundingBox, GridCell, GridPoint, SpiralGrid, HEADINGS};

#[cfg(test)]
pub(crate) use metadata::sample_document;
