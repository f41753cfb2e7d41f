//! `download`: fetch every missing tile of a region.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tilepyramid::app::TileServices;
use tilepyramid::bulk::{BulkOutcome, BulkProgress, ProgressSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::common::{load_config, RegionArgs};
use crate::error::CliError;

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub region: RegionArgs,

    /// Worker threads, overriding the configuration file
    #[arg(long)]
    pub threads: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

pub fn run(args: DownloadArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    args.region.validate()?;
    let mut config = load_config(config_path)?;
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err(CliError::Config("--threads must be at least 1".to_string()));
        }
        config.scheduler.pool_size = threads;
    }
    if config.tiles.service.is_none() {
        return Err(CliError::Config(
            "no tile service configured; set [tiles] service in config.ini".to_string(),
        ));
    }

    let services = TileServices::start(&config)?;
    let downloader = Arc::new(
        services.bulk_downloader(args.region.sector, args.region.resolution)?,
    );
    println!(
        "Downloading {} down to level {}",
        args.region.sector,
        downloader.target_level()
    );
    println!("Press Ctrl+C to stop");

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Stopping download...");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let progress = downloader.progress();
    let handle = Arc::clone(&downloader).start(cancel)?;
    let bar = progress_bar(args.quiet);
    while !handle.is_finished() {
        update_bar(&bar, &progress);
        thread::sleep(REFRESH_INTERVAL);
    }
    let outcome = handle
        .join()
        .map_err(|_| CliError::Download("download thread panicked".to_string()))?;
    services.shutdown();

    let snapshot = outcome.progress();
    match outcome {
        BulkOutcome::Completed(_) => {
            bar.finish_with_message("done");
            print_summary(&snapshot);
            info!(tiles = snapshot.current_count, "Download finished");
            Ok(())
        }
        BulkOutcome::Cancelled(_) => {
            bar.abandon_with_message("cancelled");
            print_summary(&snapshot);
            Err(CliError::Cancelled)
        }
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar
}

fn update_bar(bar: &ProgressBar, progress: &BulkProgress) {
    let snapshot = progress.snapshot();
    bar.set_length(snapshot.total_count);
    bar.set_position(snapshot.current_count);
    bar.set_message(format!(
        "{:.1}/{:.1} MB",
        mib(snapshot.current_size),
        mib(snapshot.total_size)
    ));
}

fn print_summary(snapshot: &ProgressSnapshot) {
    println!(
        "{} of {} tiles, {:.1} MB ({:.0}%)",
        snapshot.current_count,
        snapshot.total_count,
        mib(snapshot.current_size),
        snapshot.fraction() * 100.0
    );
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
