//! Single-file PLY to USDZ conversion.
//!
//! Batch code only talks to the [`Converter`] trait; [`UsdzConverter`] is the
//! implementation wired into the CLI.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

pub mod gaussians;
pub mod ply;
pub mod usd;
pub mod usdz;

use gaussians::Gaussians;
use usd::ExportSettings;

/// Converts one input file into one output file.
pub trait Converter: Sync {
    fn convert(&self, input: &Path, output: &Path, force_zero_order_sh: bool) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct UsdzConverter {
    pub export: ExportSettings,
}

impl UsdzConverter {
    pub fn new(export: ExportSettings) -> Self {
        Self { export }
    }

    /// Read a PLY file into gaussians, keeping only the DC term when `force_zero_order_sh` is set.
    pub fn load(&self, input: &Path, force_zero_order_sh: bool) -> Result<Gaussians> {
        let table = ply::read_vertex_file(input)
            .with_context(|| format!("Failed to read PLY '{}'", input.display()))?;
        if table.rows == 0 {
            bail!("'{}' has no vertices", input.display());
        }
        Gaussians::from_vertices(&table, force_zero_order_sh)
            .with_context(|| format!("Unsupported vertex layout in '{}'", input.display()))
    }
}

impl Converter for UsdzConverter {
    fn convert(&self, input: &Path, output: &Path, force_zero_order_sh: bool) -> Result<()> {
        let gaussians = self.load(input, force_zero_order_sh)?;
        debug!(
            "Loaded {} gaussians (SH degree {}) from {}",
            gaussians.len(),
            gaussians.sh_degree,
            input.display()
        );

        let mut layer = Vec::new();
        usd::write_layer(&mut layer, &gaussians, &self.export)
            .context("Failed to encode USD layer")?;

        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scene");
        let layer_name = format!("{}.usda", stem);

        // A failed write must not leave a truncated .usdz at `output`.
        let partial = output.with_extension("usdz.partial");
        if let Err(e) = usdz::write_package(&partial, &[(layer_name.as_str(), layer.as_slice())]) {
            if let Err(cleanup) = fs::remove_file(&partial) {
                debug!("Could not remove {}: {}", partial.display(), cleanup);
            }
            return Err(e).with_context(|| format!("Failed to write '{}'", output.display()));
        }
        fs::rename(&partial, output)
            .with_context(|| format!("Failed to move package into '{}'", output.display()))?;

        debug!("Wrote {} ({} bytes of USDA)", output.display(), layer.len());
        Ok(())
    }
}
