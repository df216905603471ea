//! Storage backends for pushing and pulling backup artifacts
//!
//! A target URL is resolved once into a [`Backend`] variant by its scheme:
//!
//! - `/path` or `file:///path` - local filesystem
//! - `smb://[user:pass@]host[:port]/share/path` - SMB share
//! - `s3://bucket/path` - S3-compatible object storage
//!
//! Resolution happens before any I/O, so an unknown scheme fails the whole run
//! without touching any target.

pub mod file;
pub mod s3;
pub mod smb;

use crate::error::{BackupError, Result};
use crate::utils::executor::{CommandExecutor, RealExecutor};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use url::Url;

pub use file::FileBackend;
pub use s3::S3Backend;
pub use smb::SmbBackend;

/// Secrets shared read-only by every backend for the duration of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Alternative S3 endpoint, e.g. for MinIO or DigitalOcean Spaces
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    /// SMB credentials as `user%password`, optionally `DOMAIN;user%password`
    pub smb_credentials: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    File,
    Smb,
    S3,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::File => "file",
            BackendKind::Smb => "smb",
            BackendKind::S3 => "s3",
        })
    }
}

/// Transfer implementation for one URL scheme
#[derive(Clone)]
pub enum Backend {
    File(FileBackend),
    Smb(SmbBackend),
    S3(S3Backend),
}

impl Backend {
    /// Resolve the backend for a parsed URL
    pub fn for_url(url: &Url) -> Result<Self> {
        Self::for_url_with_executor(url, Arc::new(RealExecutor::new()))
    }

    /// Resolve the backend, routing external tool invocations through `executor`
    pub fn for_url_with_executor(url: &Url, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        match url.scheme() {
            "file" => Ok(Backend::File(FileBackend::new())),
            "smb" => {
                smb::check_url_path(url).map_err(|e| BackupError::config(e.to_string()))?;
                Ok(Backend::Smb(SmbBackend::new(executor)))
            }
            "s3" => Ok(Backend::S3(S3Backend::new())),
            other => Err(BackupError::config(format!(
                "unknown url protocol: {}",
                other
            ))),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::File(_) => BackendKind::File,
            Backend::Smb(_) => BackendKind::Smb,
            Backend::S3(_) => BackendKind::S3,
        }
    }

    /// Upload `local_path` to `destination` under `remote_name`, returning bytes transferred
    pub async fn push(
        &self,
        creds: &Credentials,
        destination: &Url,
        remote_name: &str,
        local_path: &Path,
    ) -> anyhow::Result<u64> {
        match self {
            Backend::File(b) => b.push(creds, destination, remote_name, local_path).await,
            Backend::Smb(b) => b.push(creds, destination, remote_name, local_path).await,
            Backend::S3(b) => b.push(creds, destination, remote_name, local_path).await,
        }
    }

    /// Download `source` into `local_path`, returning bytes transferred
    pub async fn pull(
        &self,
        creds: &Credentials,
        source: &Url,
        local_path: &Path,
    ) -> anyhow::Result<u64> {
        match self {
            Backend::File(b) => b.pull(creds, source, local_path).await,
            Backend::Smb(b) => b.pull(creds, source, local_path).await,
            Backend::S3(b) => b.pull(creds, source, local_path).await,
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backend::{}", self.kind())
    }
}

/// A configured backup destination or restore source
#[derive(Debug, Clone)]
pub struct Target {
    raw: String,
    url: Url,
    backend: Backend,
}

impl Target {
    /// Parse a raw target string and resolve its backend
    pub fn parse(raw: &str) -> Result<Self> {
        let url = smart_parse(raw)?;
        let backend = Backend::for_url(&url)?;
        Ok(Self {
            raw: raw.to_string(),
            url,
            backend,
        })
    }

    /// Parse with a specific executor for the SMB backend
    pub fn parse_with_executor(raw: &str, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let url = smart_parse(raw)?;
        let backend = Backend::for_url_with_executor(&url, executor)?;
        Ok(Self {
            raw: raw.to_string(),
            url,
            backend,
        })
    }

    /// The target as configured
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// URL with any password removed, safe for logs
    pub fn redacted(&self) -> String {
        let mut url = self.url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("****"));
        }
        url.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Parse every target up front; the first unresolvable one aborts with a config error
pub fn parse_targets(raw: &[String]) -> Result<Vec<Target>> {
    if raw.is_empty() {
        return Err(BackupError::config("must provide at least one target"));
    }
    raw.iter().map(|t| Target::parse(t)).collect()
}

/// Parse a target URL, treating a leading `/` as a local `file://` path
pub fn smart_parse(raw: &str) -> Result<Url> {
    let normalized = if raw.starts_with('/') {
        format!("file://{}", raw)
    } else {
        raw.to_string()
    };

    Url::parse(&normalized)
        .map_err(|e| BackupError::config(format!("invalid target url '{}': {}", raw, e)))
}
