//! Birdseye imagery service access.
//!
//! This module provides the HTTP fetcher abstraction ([`AsyncHttpClient`])
//! and the URL construction for the two kinds of request the pipeline makes:
//! tile images and birdseye metadata documents ([`BirdseyeEndpoints`]).
//!
//! ```ignore
//! use birdseye::provider::{AsyncReqwestClient, BirdseyeEndpoints};
//!
//! let client = AsyncReqwestClient::new()?;
//! let endpoints = BirdseyeEndpoints::default().with_api_key("...");
//! let bytes = client.get(&endpoints.tile_url(tile)).await?;
//! ```

mod endpoints;
mod http;
mod types;

pub use endpoints::{
    BirdseyeEndpoints, DEFAULT_CATALOG_ID, DEFAULT_METADATA_HOST, DEFAULT_QUERY_SUFFIX,
    DEFAULT_TILE_HOST,
};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use types::ProviderError;

#[cfg(test)]
pub use http::tests::{MockAsyncHttpClient, ScriptedHttpClient};
