//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, init, show)
//! - [`reconcile`] - Sweep the dataset and stitch what is due
//! - [`run`] - Main command (crawl, download, stitch)

pub mod config;
pub mod reconcile;
pub mod run;
