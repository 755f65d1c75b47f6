use clap::builder::BoolishValueParser;
use clap::Args;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod config;
pub mod converter;
pub mod shared;

#[derive(Debug, Args)]
pub struct BatchConvertArgs {
    /// Input directory containing PLY files (searched recursively)
    #[arg(required = true)]
    pub input_dir: PathBuf,

    /// Output directory for USDZ files. The input directory structure is preserved.
    #[arg(required = true)]
    pub output_dir: PathBuf,

    /// Number of parallel workers [default: 1, or `workers` from .plyusdz.yaml]
    #[clap(short, long)]
    pub workers: Option<NonZeroUsize>,

    /// Force conversion to 0-order spherical harmonics for Isaac Sim 5.0 compatibility.
    /// On unless disabled with `--force-zero-order-sh false`.
    #[clap(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub force_zero_order_sh: Option<bool>,

    /// Show what would be converted without actually converting
    #[clap(long)]
    pub dry_run: bool,

    /// Replace outputs that already exist. Use `--overwrite false` to skip them.
    #[clap(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub overwrite: Option<bool>,

    /// Do not draw a progress bar
    #[clap(long)]
    pub no_progress: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input PLY file
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output USDZ file (defaults to the input path with a .usdz extension)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Force conversion to 0-order spherical harmonics for Isaac Sim 5.0 compatibility.
    /// On unless disabled with `--force-zero-order-sh false`.
    #[clap(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub force_zero_order_sh: Option<bool>,
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

// Error handling utility that can be used by both lib and binary
pub fn handle_error(e: anyhow::Error) {
    eprintln!("Error!");
    for (i, cause) in e.chain().enumerate() {
        eprintln!("  Cause {}: {}", i, cause);
    }
    std::process::exit(1);
}
