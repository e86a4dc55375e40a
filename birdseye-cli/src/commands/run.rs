//! Run command: crawl, download and stitch.

use std::path::{Path, PathBuf};

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use birdseye::tile::{parse_image_token, read_image_tokens, ImageKey};

use crate::error::CliError;
use crate::runner::{cancel_on_ctrl_c, CliRunner};

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Images to download first, as imageId or imageId-zoom (zoom defaults to 20).
    ///
    /// A single argument naming an existing file is read one token per line.
    pub images: Vec<String>,

    /// Read additional image tokens from a file, one per line
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Only process the given images; do not crawl metadata
    #[arg(long)]
    pub no_crawl: bool,
}

/// Run the full pipeline.
pub fn run(args: RunArgs, config: Option<&Path>, debug: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(config, debug)?;
    runner.log_startup("run");

    let seeds = resolve_images(&args)?;
    let crawl = !args.no_crawl;
    if !crawl && seeds.is_empty() {
        return Err(CliError::Config(
            "--no-crawl needs at least one image to process".to_string(),
        ));
    }

    println!("Dataset: {}", runner.config().dataset.root.display());
    if !seeds.is_empty() {
        println!("Seed images: {}", seeds.len());
    }
    if crawl {
        let crawl = &runner.config().crawl;
        println!(
            "Crawling: ({}, {}) to ({}, {})",
            crawl.min_lat, crawl.min_lon, crawl.max_lat, crawl.max_lon
        );
    }
    println!("Press Ctrl+C to stop");
    println!();

    let cancel = CancellationToken::new();
    let orchestrator = runner.orchestrator(cancel.clone())?;
    let runtime = runner.runtime()?;

    let summary = runtime.block_on(async {
        cancel_on_ctrl_c(cancel);
        orchestrator.run(&seeds, crawl).await
    })?;

    println!();
    if summary.cancelled {
        println!("Run interrupted. Run again to resume.");
    } else {
        println!("Run complete.");
    }
    println!("  {}", summary.stats);
    if let Some(sweep) = summary.sweep {
        println!(
            "  sweep: {} images checked, {} queued, {} incomplete",
            sweep.images_checked, sweep.queued, sweep.incomplete
        );
    }
    Ok(())
}

/// Collects seed images from positional tokens and the input file.
fn resolve_images(args: &RunArgs) -> Result<Vec<ImageKey>, CliError> {
    let mut images = Vec::new();

    match args.images.as_slice() {
        [single] if Path::new(single).is_file() => {
            images.extend(read_list(Path::new(single))?);
        }
        tokens => {
            for token in tokens {
                match parse_image_token(token) {
                    Ok(image) => images.push(image),
                    Err(e) => {
                        warn!(token = %token, error = %e, "Skipping invalid image token");
                        eprintln!("Skipping '{}': {}", token, e);
                    }
                }
            }
        }
    }

    if let Some(path) = &args.input {
        images.extend(read_list(path)?);
    }

    Ok(images)
}

fn read_list(path: &Path) -> Result<Vec<ImageKey>, CliError> {
    read_image_tokens(path).map_err(|error| CliError::Input {
        path: path.to_path_buf(),
        error,
    })
}
