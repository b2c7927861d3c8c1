//! Quadratic threshold calibration
//!
//! Finds fixed-point coefficients `(a_fp, b_fp, c)` whose quadratic
//! overapproximates every measured bucket threshold with minimal average waste,
//! then writes the coefficient record.
//!
//! **Usage:**
//! ```bash
//! qcal-fit [--config <file>] [--dataset <file>] [--shift 14] [--a-bounds 0,50] [--dry-run]
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use qcal_common::CalibrationConfig;
use qcal_fit::{
    find_best_fixed_point, CliFormatter, CoefficientRecord, Dataset, LoadPolicy, SearchBounds,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

/// Fixed-point quadratic calibration
#[derive(Parser, Debug)]
#[command(name = "qcal-fit")]
#[command(about = "Search fixed-point quadratic coefficients that overapproximate measured thresholds")]
struct Args {
    /// Config file (overrides QCAL_CONFIG and the user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Measurement history JSON
    #[arg(long, value_name = "FILE")]
    dataset: Option<PathBuf>,

    /// Coefficient record to (over)write
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Fixed-point shift exponent
    #[arg(long)]
    shift: Option<u32>,

    /// Inclusive a_fp bounds, e.g. `0,50`
    #[arg(long, value_name = "LO,HI", value_parser = parse_bounds, allow_hyphen_values = true)]
    a_bounds: Option<(i64, i64)>,

    /// Inclusive b_fp bounds, e.g. `-100,0`
    #[arg(long, value_name = "LO,HI", value_parser = parse_bounds, allow_hyphen_values = true)]
    b_bounds: Option<(i64, i64)>,

    /// Inclusive c bounds, e.g. `110,130`
    #[arg(long, value_name = "LO,HI", value_parser = parse_bounds, allow_hyphen_values = true)]
    c_bounds: Option<(i64, i64)>,

    /// Print the resolved bucket/threshold table before searching
    #[arg(long)]
    show_dataset: bool,

    /// Search and report without writing the coefficient record
    #[arg(long)]
    dry_run: bool,
}

fn parse_bounds(s: &str) -> std::result::Result<(i64, i64), String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LO,HI but got '{}'", s))?;
    let lo = lo.trim().parse::<i64>().map_err(|e| format!("bad lower bound: {}", e))?;
    let hi = hi.trim().parse::<i64>().map_err(|e| format!("bad upper bound: {}", e))?;
    Ok((lo, hi))
}

/// Command-line values override the loaded config field by field
fn apply_overrides(config: &mut CalibrationConfig, args: &Args) {
    if let Some(path) = &args.dataset {
        config.dataset_path = path.clone();
    }
    if let Some(path) = &args.output {
        config.output_path = path.clone();
    }
    if let Some(shift) = args.shift {
        config.shift = shift;
    }
    if args.a_bounds.is_some() {
        config.a_bounds = args.a_bounds;
    }
    if args.b_bounds.is_some() {
        config.b_bounds = args.b_bounds;
    }
    if args.c_bounds.is_some() {
        config.c_bounds = args.c_bounds;
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting qcal-fit v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let start_time = Instant::now();
    if let Err(e) = run(&args) {
        error!("Calibration failed: {:#}", e);
        std::process::exit(1);
    }
    info!("Calibration finished in {:.1} seconds", start_time.elapsed().as_secs_f64());
}

fn run(args: &Args) -> Result<()> {
    let mut config = CalibrationConfig::load(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    config.validate()?;

    println!("{}", CliFormatter::format_banner("QUADRATIC OVERAPPROXIMATION (FIXED-POINT SEARCH)"));

    let dataset = Dataset::load(&config.dataset_path, LoadPolicy::from(&config))
        .with_context(|| format!("loading {}", config.dataset_path.display()))?;
    let buckets = dataset.buckets();
    println!(
        "Loaded {} buckets: {} - {}",
        dataset.len(),
        buckets[0],
        buckets[buckets.len() - 1]
    );

    if args.show_dataset {
        println!("\n{}", CliFormatter::format_dataset(dataset.iter()));
    }

    let bounds = SearchBounds::from_config(&config)?;
    println!("{}", CliFormatter::format_search_header(config.shift, &bounds));

    let outcome = find_best_fixed_point(&dataset, config.shift, &bounds)?;
    println!("{}", CliFormatter::format_stats(&outcome.stats));

    let best = match outcome.best {
        Some(best) => best,
        None => {
            warn!("No feasible candidate; widen the bounds and retry");
            println!("No feasible fixed-point solution found within the provided bounds.");
            return Ok(());
        }
    };

    print!("{}", CliFormatter::format_solution(&best, dataset.buckets()));

    if args.dry_run {
        info!("Dry run: coefficient record not written");
        return Ok(());
    }

    CoefficientRecord::from(&best)
        .export_json(&config.output_path)
        .with_context(|| format!("writing {}", config.output_path.display()))?;
    println!("\nSaved coefficients to {}", config.output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("0,50"), Ok((0, 50)));
        assert_eq!(parse_bounds("-100, 0"), Ok((-100, 0)));
        assert!(parse_bounds("5").is_err());
        assert!(parse_bounds("a,1").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "qcal-fit",
            "--shift",
            "12",
            "--b-bounds",
            "-100,0",
            "--dataset",
            "measured.json",
        ]);
        let mut config = CalibrationConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.shift, 12);
        assert_eq!(config.b_bounds, Some((-100, 0)));
        assert_eq!(config.a_bounds, None);
        assert_eq!(config.dataset_path, PathBuf::from("measured.json"));
        assert_eq!(config.output_path, PathBuf::from("quadratic_coefficients.json"));
    }
}
