//! `estimate`: how much of a region is missing from the cache.

use std::path::Path;

use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tilepyramid::app::TileServices;
use tilepyramid::bulk::BulkEstimate;

use super::common::{load_config, RegionArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub region: RegionArgs,

    /// Print the estimate as JSON
    #[arg(long)]
    pub json: bool,

    /// Seed for cell sampling, for reproducible estimates
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: EstimateArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    args.region.validate()?;
    let config = load_config(config_path)?;
    let services = TileServices::start(&config)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let estimate = services
        .estimator()
        .estimate(&args.region.sector, args.region.resolution, &mut rng)?;
    services.shutdown();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        print_estimate(&estimate, &args.region);
    }
    Ok(())
}

fn print_estimate(estimate: &BulkEstimate, region: &RegionArgs) {
    println!("Region:       {}", region.sector);
    println!(
        "Resolution:   {} deg (level {})",
        region.resolution, estimate.target_level
    );
    println!();
    println!("{:>6} {:>12} {:>12} {:>10}", "Level", "Tiles", "Missing", "Sampled");
    for level in &estimate.levels {
        println!(
            "{:>6} {:>12} {:>12} {:>10}",
            level.level, level.total_tiles, level.missing_tiles, level.sampled_tiles
        );
    }
    println!();
    println!(
        "Missing {} of {} tiles, about {:.1} MB",
        estimate.missing_tiles,
        estimate.total_tiles,
        estimate.missing_bytes as f64 / (1024.0 * 1024.0)
    );
}
