use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sharefs::{Config, LocalTransport, ReplicatedFs};

mod commands;

#[derive(Parser)]
#[command(name = "sharefs", about = "Replicated share-group file system")]
struct Cli {
    /// Local database root directory
    #[arg(long)]
    db_root: PathBuf,

    /// Optional key=value configuration file (share groups, poll interval)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Namespace for configuration lookup and file naming
    #[arg(long, default_value = "db")]
    namespace: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a staged local file or directory. The staged path is
    /// consumed: put is a move, not a copy.
    Put {
        group: String,
        rel: PathBuf,
        staged: PathBuf,
        /// Leave existing destination data untouched
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Wait until a file is fully replicated locally and print its path
    Get {
        group: String,
        rel: PathBuf,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Remove a file's data and completion flag at every location
    Rm { group: String, rel: PathBuf },
    /// Rename a file within its share group
    Mv {
        group: String,
        src: PathBuf,
        dst: PathBuf,
    },
    /// Write a directory's completion flag without writing data
    Complete { group: String, rel: PathBuf },
    /// List the registered share groups
    Groups,
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::new(),
    };

    let mut fs = ReplicatedFs::open(
        &cli.db_root,
        &cli.namespace,
        &config,
        Arc::new(LocalTransport::new()),
    )
    .await
    .with_context(|| format!("opening database root {}", cli.db_root.display()))?;

    let outcome = commands::run(&cli.namespace, &fs, &cli.command).await;
    let closed = fs.close().await;
    outcome?;
    closed?;
    Ok(())
}
