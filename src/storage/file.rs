//! Local filesystem backend

use super::Credentials;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct FileBackend;

impl FileBackend {
    pub fn new() -> Self {
        Self
    }

    /// Copy `local_path` into the directory named by `destination`. The directory must exist.
    pub async fn push(
        &self,
        _creds: &Credentials,
        destination: &Url,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<u64> {
        let dir = url_path(destination)?;
        let dest = dir.join(remote_name);
        debug!("Copying {} to {}", local_path.display(), dest.display());
        copy_stream(local_path, &dest).await
    }

    /// Copy the file named by `source` to `local_path`
    pub async fn pull(&self, _creds: &Credentials, source: &Url, local_path: &Path) -> Result<u64> {
        let src = url_path(source)?;
        debug!("Copying {} to {}", src.display(), local_path.display());
        copy_stream(&src, local_path).await
    }
}

fn url_path(url: &Url) -> Result<PathBuf> {
    url.to_file_path()
        .map_err(|_| anyhow::anyhow!("Not a local file path: {}", url))
}

async fn copy_stream(src: &Path, dest: &Path) -> Result<u64> {
    let input = File::open(src)
        .await
        .with_context(|| format!("Failed to open {}", src.display()))?;
    let output = File::create(dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);
    let copied = tokio::io::copy(&mut reader, &mut writer)
        .await
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    writer
        .flush()
        .await
        .with_context(|| format!("Failed to flush {}", dest.display()))?;

    Ok(copied)
}
