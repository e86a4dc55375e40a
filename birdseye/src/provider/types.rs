//! Provider error types.

use std::fmt;

/// Errors that can occur while fetching from the imagery service.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// HTTP request failed or returned a non-success status
    HttpError(String),
    /// The response arrived but its body is unusable
    InvalidResponse(String),
    /// The request was abandoned before completion
    Cancelled,
}

impl ProviderError {
    /// Whether the error is worth retrying on a later run.
    ///
    /// Every provider failure leaves disk state untouched, so a later run
    /// or reconciliation pass re-attempts the same work.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::HttpError(_) | ProviderError::Cancelled)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for ProviderError {}
