//! Mosaic tool abstraction.
//!
//! The tool that actually combines tiles into a mosaic is an external
//! program. [`MosaicTool`] is the seam tests replace with a recorder.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, trace};

use super::job::StitchJob;

/// Errors from running the mosaic tool.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    ToolFailed { program: PathBuf, status: ExitStatus },
}

/// Combines the tiles of one image directory into a mosaic.
pub trait MosaicTool: Send + Sync + 'static {
    /// Runs one job to completion.
    fn combine(&self, job: &StitchJob) -> impl Future<Output = Result<(), MosaicError>> + Send;
}

/// Runs an external program from the dataset root.
///
/// The program receives a single argument, `"{zoom}\{imageId} {grid}"`,
/// exactly as [`StitchJob::argument`] renders it.
#[derive(Debug, Clone)]
pub struct ExternalMosaicTool {
    program: PathBuf,
    working_dir: PathBuf,
}

impl ExternalMosaicTool {
    /// Creates a tool running `program` inside `working_dir`.
    ///
    /// A relative `program` that exists under `working_dir` is resolved
    /// there; otherwise it is looked up on `PATH`.
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let working_dir = working_dir.into();
        let program = if program.is_relative() && working_dir.join(&program).is_file() {
            working_dir.join(&program)
        } else {
            program
        };
        Self {
            program,
            working_dir,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl MosaicTool for ExternalMosaicTool {
    async fn combine(&self, job: &StitchJob) -> Result<(), MosaicError> {
        trace!(program = %self.program.display(), argument = %job.argument(), "Starting mosaic tool");

        let status = Command::new(&self.program)
            .arg(job.argument())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| MosaicError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(MosaicError::ToolFailed {
                program: self.program.clone(),
                status,
            });
        }

        debug!(job = %job, "Mosaic tool finished");
        Ok(())
    }
}
