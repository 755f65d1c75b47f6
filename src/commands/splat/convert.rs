use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::commands::splat::splat_utils::{is_ply, OUTPUT_EXTENSION};
use crate::config::Config;
use crate::converter::{Converter, UsdzConverter};
use crate::ConvertArgs;

pub fn execute(args: ConvertArgs) -> Result<()> {
    let config = Config::load()?;
    let converter = UsdzConverter::new(config.export.clone());
    run_convert(&args, &config, &converter)
}

pub fn run_convert<C: Converter>(args: &ConvertArgs, config: &Config, converter: &C) -> Result<()> {
    let input = &args.input;
    if !input.exists() {
        bail!("Input file does not exist: {}", input.display());
    }
    if !is_ply(input) {
        bail!("Input file must be a PLY file: {}", input.display());
    }

    let output = output_path(args);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create directory '{}'", parent.display()))?;
    }

    let force_zero_order_sh = args
        .force_zero_order_sh
        .unwrap_or(config.force_zero_order_sh);
    info!("Converting {} to {}", input.display(), output.display());
    if force_zero_order_sh {
        info!("Forcing 0-order spherical harmonics");
    }

    converter
        .convert(input, &output, force_zero_order_sh)
        .with_context(|| format!("Error processing PLY file {}", input.display()))?;

    info!("Successfully exported to {}", output.display());
    Ok(())
}

/// Explicit `--output`, or the input path with a `.usdz` extension.
fn output_path(args: &ConvertArgs) -> PathBuf {
    match &args.output {
        Some(output) => output.clone(),
        None => args.input.with_extension(OUTPUT_EXTENSION),
    }
}
