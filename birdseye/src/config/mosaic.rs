//! Mosaic dispatcher configuration.

use std::path::{Path, PathBuf};

use super::defaults::{DEFAULT_MOSAIC_TOOL, DEFAULT_MOSAIC_WORKERS};

/// Configuration for the mosaic stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicConfig {
    /// Mosaic tool executable
    tool: PathBuf,
    /// Concurrent mosaic tool runs
    workers: usize,
}

impl MosaicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mosaic tool. Relative paths resolve against the dataset root.
    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Set the number of workers. Zero is raised to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_MOSAIC_TOOL),
            workers: DEFAULT_MOSAIC_WORKERS,
        }
    }
}
