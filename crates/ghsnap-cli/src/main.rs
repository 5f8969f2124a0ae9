use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ghsnap")]
#[command(about = "Snapshot a GitHub user's public contributions into a JSON file")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every facet and write the snapshot (default)
    Fetch,
    /// Print a Markdown digest of an existing snapshot
    Summary {
        /// Snapshot to read; defaults to the configured output path
        path: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Fetch) {
        Commands::Fetch => match ghsnap_sync::run_snapshot_once_from_env().await {
            Ok(summary) => {
                println!(
                    "snapshot written: run_id={} path={} bytes={} activity={} repositories={} pull_requests={} issues={}",
                    summary.run_id,
                    summary.output_path,
                    summary.bytes,
                    summary.activity,
                    summary.repositories,
                    summary.pull_requests,
                    summary.issues
                );
            }
            Err(err) => {
                error!(error = ?err, "failed to write GitHub contributions snapshot");
                return Err(err);
            }
        },
        Commands::Summary { path } => {
            let path = match path {
                Some(path) => path,
                None => ghsnap_sync::snapshot_path_from_env().await?,
            };
            println!("{}", ghsnap_sync::snapshot_summary_markdown(&path)?);
        }
    }

    Ok(())
}
