//! Birdseye - aerial imagery acquisition for oblique birdseye datasets
//!
//! This library discovers birdseye images over a geographic area, downloads
//! their tiles into a resumable on-disk dataset, and drives an external
//! mosaic tool once an image's tiles are all present.
//!
//! # High-Level API
//!
//! The [`orchestrator`] module runs the whole pipeline:
//!
//! ```ignore
//! use std::sync::Arc;
//! use birdseye::config::ConfigFile;
//! use birdseye::mosaic::ExternalMosaicTool;
//! use birdseye::orchestrator::Orchestrator;
//! use birdseye::provider::AsyncReqwestClient;
//!
//! let config = ConfigFile::load()?;
//! let layout = config.layout();
//! let tool = ExternalMosaicTool::new(&config.mosaic.tool, layout.root());
//! let summary = Orchestrator::new(layout, Arc::new(AsyncReqwestClient::new()?), Arc::new(tool))
//!     .with_endpoints(config.endpoints())
//!     .with_crawl_config(config.crawl_config())
//!     .with_download_config(config.download_config())
//!     .with_mosaic_config(config.mosaic_config())
//!     .run(&[], true)
//!     .await?;
//! ```
//!
//! Progress is always judged from disk, so an interrupted run is resumed by
//! simply running again.

pub mod config;
pub mod context;
pub mod crawler;
pub mod error;
pub mod layout;
pub mod limiter;
pub mod logging;
pub mod mosaic;
pub mod orchestrator;
pub mod probe;
pub mod provider;
pub mod reports;
pub mod scheduler;
pub mod tile;

/// Version of the birdseye library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
