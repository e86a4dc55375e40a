//! HTTP fetcher seam and its reqwest implementation.

use super::types::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Fetches one URL and yields the whole body.
///
/// Both tile images and metadata documents are fetched through this trait,
/// which lets tests substitute scripted responses for the network.
/// Completions are reported by the returned future; callers decide what a
/// success, failure, or drop (cancellation) means for their own state.
pub trait AsyncHttpClient: Send + Sync {
    /// GETs `url`; non-success statuses are errors.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// User-Agent sent with every request.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Idle connections kept per host; sized for the default tile ceiling.
const POOL_IDLE_PER_HOST: usize = 128;

/// Production fetcher backed by reqwest.
///
/// One client is shared by the tile scheduler and the metadata crawler, so
/// the pool keeps many warm connections to the two hosts.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Creates a client whose requests give up after `timeout_secs`.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(POOL_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map(|client| Self { client })
            .map_err(|e| ProviderError::HttpError(format!("cannot build HTTP client: {}", e)))
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        trace!(url, "GET");

        let response = self.client.get(url).send().await.map_err(|e| {
            debug!(url, error = %e, timeout = e.is_timeout(), "Request not completed");
            send_error(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Non-success status");
            return Err(ProviderError::HttpError(format!("HTTP {}", status.as_u16())));
        }

        let body = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "Response body interrupted");
            ProviderError::HttpError(format!("body read failed: {}", e))
        })?;
        trace!(url, bytes = body.len(), "GET complete");
        Ok(body.to_vec())
    }
}

/// Maps a transport failure onto a short error message.
fn send_error(e: &reqwest::Error) -> ProviderError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ProviderError::HttpError(format!("{}: {}", kind, e))
}
