//! pixdrop command line entry point.

mod app;
mod config;
mod registrar;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pixdrop_upload::TransferFailurePolicy;

#[derive(Parser, Debug)]
#[command(name = "pixdrop", version, about = "Preview, register and upload image files")]
struct Cli {
    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Configuration file (defaults to ~/.config/pixdrop/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the storage directory from the configuration
    #[arg(short, long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Stop uploading after the first failed transfer
    #[arg(long)]
    halt_on_error: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pixdrop=debug")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting pixdrop");

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(dir) = cli.storage_dir {
        config.storage_dir = dir.to_string_lossy().into_owned();
    }
    if cli.halt_on_error {
        config.queue.transfer_failure = TransferFailurePolicy::Halt;
    }
    tracing::info!(storage = %config.storage_dir, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(app::run(config, cli.files))?;

    tracing::info!(
        confirmed = summary.confirmed,
        failed = summary.failed,
        rejected = summary.rejected,
        "upload finished"
    );
    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} file(s) were not uploaded",
            summary.selected - summary.confirmed,
            summary.selected
        );
    }
    Ok(())
}
