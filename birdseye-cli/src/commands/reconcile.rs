//! Reconcile command: sweep the dataset and stitch, without network access.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::{cancel_on_ctrl_c, CliRunner};

/// Run one reconciliation sweep.
pub fn run(config: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(config, debug)?;
    runner.log_startup("reconcile");
    println!("Reconciling: {}", runner.config().dataset.root.display());

    let cancel = CancellationToken::new();
    let orchestrator = runner.orchestrator(cancel.clone())?;
    let runtime = runner.runtime()?;

    let summary = runtime.block_on(async {
        cancel_on_ctrl_c(cancel);
        orchestrator.reconcile_only().await
    })?;

    if let Some(sweep) = summary.sweep {
        println!(
            "Checked {} images: {} stitched, {} incomplete, {} up to date",
            sweep.images_checked, sweep.queued, sweep.incomplete, sweep.up_to_date
        );
    }
    if summary.stats.stitches_failed > 0 {
        println!(
            "{} mosaic tool runs failed, see errors.txt in the dataset root",
            summary.stats.stitches_failed
        );
    }
    Ok(())
}
