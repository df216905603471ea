//! Tar packaging of SQL dumps and its compression
//!
//! Every artifact is a compressed tar container, whether it holds one combined
//! dump or one file per schema. Work here is blocking file I/O, so the async
//! entry points move it onto the blocking pool.

pub mod compression;
pub mod naming;

pub use compression::{CompressWriter, Compressor, DecompressReader};
pub use naming::{dump_file_name, timestamp, FilenamePattern, DEFAULT_FILENAME_PATTERN};

use crate::error::{BackupError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bundle `files` (by file name, flat) into a compressed tar at `archive_path`.
///
/// Returns the size of the written archive.
pub fn pack(files: &[PathBuf], archive_path: &Path, compressor: Compressor) -> Result<u64> {
    let out = File::create(archive_path)
        .map_err(|e| BackupError::io(format!("creating {}", archive_path.display()), e))?;
    let mut builder = tar::Builder::new(compressor.compress(BufWriter::new(out)));

    for file in files {
        let name = file.file_name().ok_or_else(|| {
            BackupError::io(
                format!("adding {} to archive", file.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
        debug!("Adding {} to {}", file.display(), archive_path.display());
        builder
            .append_path_with_name(file, name)
            .map_err(|e| BackupError::io(format!("adding {} to archive", file.display()), e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| BackupError::io("finishing tar stream", e))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| BackupError::io("finishing compression", e))?;
    writer
        .flush()
        .map_err(|e| BackupError::io(format!("flushing {}", archive_path.display()), e))?;

    let size = std::fs::metadata(archive_path)
        .map_err(|e| BackupError::io(format!("reading size of {}", archive_path.display()), e))?
        .len();
    Ok(size)
}

/// Extract a compressed tar into `dest_dir`
pub fn unpack(archive_path: &Path, dest_dir: &Path, compressor: Compressor) -> Result<()> {
    let input = File::open(archive_path)
        .map_err(|e| BackupError::io(format!("opening {}", archive_path.display()), e))?;
    let mut archive = tar::Archive::new(compressor.uncompress(BufReader::new(input)));
    archive
        .unpack(dest_dir)
        .map_err(|e| BackupError::io(format!("extracting {}", archive_path.display()), e))
}

/// Regular files directly under `dir`, in name order
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let context = || format!("listing {}", dir.display());
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| BackupError::io(context(), e))? {
        let entry = entry.map_err(|e| BackupError::io(context(), e))?;
        let file_type = entry.file_type().map_err(|e| BackupError::io(context(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        } else {
            debug!("Skipping non-file entry {}", entry.path().display());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub async fn pack_async(
    files: Vec<PathBuf>,
    archive_path: PathBuf,
    compressor: Compressor,
) -> Result<u64> {
    tokio::task::spawn_blocking(move || pack(&files, &archive_path, compressor))
        .await
        .map_err(|e| BackupError::io("packing archive", std::io::Error::other(e)))?
}

pub async fn unpack_async(
    archive_path: PathBuf,
    dest_dir: PathBuf,
    compressor: Compressor,
) -> Result<()> {
    tokio::task::spawn_blocking(move || unpack(&archive_path, &dest_dir, compressor))
        .await
        .map_err(|e| BackupError::io("extracting archive", std::io::Error::other(e)))?
}
