//! Vidstash CLI - Command-line interface
//!
//! Runs the HTTP server or a single ingestion or transcode job.

mod commands;

use std::path::{Path, PathBuf};

use clap::Parser;
use vidstash_core::VidstashConfig;
use vidstash_core::tracing_setup::{CliLogLevel, init_tracing};

/// Main CLI structure for Vidstash.
///
/// Global options override the environment; subcommands pick the job.
#[derive(Parser)]
#[command(name = "vidstash")]
#[command(about = "Range-addressable media server with URL and swarm ingestion")]
#[command(version)]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory holding every stored file
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), Some(Path::new("logs")))?;

    let mut config = VidstashConfig::from_env();
    if let Some(root) = cli.storage_root {
        config.storage.root = root;
    }

    commands::handle_command(cli.command, config).await
}
