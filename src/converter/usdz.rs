use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// USDZ requires every entry's data to start on a 64-byte boundary.
pub const USDZ_ALIGNMENT: u16 = 64;

#[derive(Debug, thiserror::Error)]
pub enum UsdzError {
    #[error("I/O error writing '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("USDZ package needs at least one layer")]
    Empty,
}

/// Write a USDZ package at `path`. The first entry becomes the root layer.
pub fn write_package(path: &Path, entries: &[(&str, &[u8])]) -> Result<(), UsdzError> {
    if entries.is_empty() {
        return Err(UsdzError::Empty);
    }

    let io_err = |e| UsdzError::Io(path.to_path_buf(), e);
    let file = File::create(path).map_err(io_err)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .with_alignment(USDZ_ALIGNMENT);

    for (name, data) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(data).map_err(io_err)?;
    }

    let mut writer = zip.finish()?;
    writer.flush().map_err(io_err)?;
    Ok(())
}
