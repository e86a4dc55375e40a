//! Process-fatal pipeline errors.
//!
//! Everything that can go wrong once a run is underway is recoverable and
//! ends up in the errors log; only startup failures surface here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::reports::ReportError;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dataset directory skeleton could not be created.
    #[error("failed to prepare dataset at {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A run artifact could not be opened or rotated.
    #[error(transparent)]
    Reports(#[from] ReportError),
}
