//! Mosaic stage: turning complete tile directories into combined images.

mod dispatcher;
mod job;
mod tool;

pub use dispatcher::{DispatchOutcome, MosaicDispatcher, SweepSummary};
pub use job::StitchJob;
pub use tool::{ExternalMosaicTool, MosaicError, MosaicTool};

#[cfg(test)]
pub(crate) use tool::tests::RecordingTool;
