use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const INPUT_EXTENSION: &str = "ply";
pub const OUTPUT_EXTENSION: &str = "usdz";

/// One PLY to USDZ conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Input path relative to the input root, used in log lines.
    pub relative_path: PathBuf,
}

/// Determine file extension in lowercase.
pub fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn is_ply(path: &Path) -> bool {
    extension(path) == INPUT_EXTENSION
}

pub fn validate_input_dir(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        bail!("Input directory does not exist: {}", input_dir.display());
    }
    if !input_dir.is_dir() {
        bail!("Input path is not a directory: {}", input_dir.display());
    }
    Ok(())
}

/// Recursively find all PLY files under `input_dir`, sorted by path.
pub fn find_ply_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    validate_input_dir(input_dir)?;

    let mut ply_files = Vec::new();
    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && is_ply(entry.path()) {
            ply_files.push(entry.into_path());
        }
    }
    ply_files.sort();

    info!("Found {} PLY files in {}", ply_files.len(), input_dir.display());
    Ok(ply_files)
}

/// Map each input file to an output path under `output_dir` with the same relative layout.
/// Inputs whose output would collide with an earlier task are dropped.
pub fn create_conversion_tasks(
    ply_files: &[PathBuf],
    input_dir: &Path,
    output_dir: &Path,
) -> Result<Vec<ConversionTask>> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(ply_files.len());

    for ply_file in ply_files {
        let relative_path = ply_file
            .strip_prefix(input_dir)
            .with_context(|| {
                format!(
                    "'{}' is not inside input directory '{}'",
                    ply_file.display(),
                    input_dir.display()
                )
            })?
            .to_path_buf();
        let output_path = output_dir.join(relative_path.with_extension(OUTPUT_EXTENSION));

        if !seen.insert(output_path.clone()) {
            warn!(
                "Skipping {}: output {} is already produced by another file",
                relative_path.display(),
                output_path.display()
            );
            continue;
        }

        tasks.push(ConversionTask {
            input_path: ply_file.clone(),
            output_path,
            relative_path,
        });
    }

    Ok(tasks)
}
