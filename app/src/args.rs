use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the annotator binary.
#[derive(Debug, Parser)]
#[command(name = "annotator", version, about = "Clinical-note annotation pipeline orchestrator")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ANNOTATOR_CONFIG", default_value = "annotator.toml")]
    pub config: PathBuf,

    /// Override the log filter from the config file (e.g. "info" or "annot_engine=debug").
    #[arg(long, env = "ANNOTATOR_LOG")]
    pub log_filter: Option<String>,
}
