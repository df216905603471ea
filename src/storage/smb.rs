//! SMB backend driven through Samba's `smbclient`
//!
//! `smb://[user:pass@]host[:port]/share/dir` maps to `//host/share` with `dir`
//! as the in-share working directory. The password never appears on the command
//! line; it is handed to `smbclient` through `PASSWD`.

use super::Credentials;
use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const SMBCLIENT: &str = "smbclient";
const DEFAULT_PORT: u16 = 445;

#[derive(Clone)]
pub struct SmbBackend {
    executor: Arc<dyn CommandExecutor>,
}

impl fmt::Debug for SmbBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmbBackend").finish_non_exhaustive()
    }
}

/// Host, share and in-share directory of an SMB URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbLocation {
    pub host: String,
    pub port: u16,
    pub share: String,
    /// Path inside the share, without leading or trailing `/`; empty for the share root
    pub path: String,
}

impl SmbLocation {
    pub fn parse(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow::anyhow!("SMB url has no host: {}", url))?
            .to_string();

        let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
        let mut segments = decoded.split('/').filter(|s| !s.is_empty());
        let share = segments
            .next()
            .ok_or_else(|| anyhow::anyhow!("SMB url has no share: {}", url))?
            .to_string();
        let path = segments.collect::<Vec<_>>().join("/");

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            share,
            path,
        })
    }

    fn service(&self) -> String {
        format!("//{}/{}", self.host, self.share)
    }

    /// Split the in-share path into its directory and final component
    fn split_file(&self) -> Option<(&str, &str)> {
        match self.path.rsplit_once('/') {
            Some((dir, file)) => Some((dir, file)),
            None if !self.path.is_empty() => Some(("", self.path.as_str())),
            None => None,
        }
    }
}

/// NTLM identity used for a connection; an empty user means anonymous
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmbAuth {
    pub domain: Option<String>,
    pub user: String,
    pub password: String,
}

impl SmbAuth {
    /// Explicit credentials win over URL userinfo, which wins over anonymous
    pub fn resolve(creds: &Credentials, url: &Url) -> Self {
        let (user, password) = match creds.smb_credentials.as_deref().filter(|c| !c.is_empty()) {
            Some(explicit) => match explicit.split_once('%') {
                Some((user, password)) => (user.to_string(), password.to_string()),
                None => (explicit.to_string(), String::new()),
            },
            None if !url.username().is_empty() => (
                decode(url.username()),
                url.password().map(decode).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };

        match user.split_once(';') {
            Some((domain, user)) => Self {
                domain: Some(domain.to_string()),
                user: user.to_string(),
                password,
            },
            None => Self {
                domain: None,
                user,
                password,
            },
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_empty()
    }
}

/// Characters that would break out of a quoted argument in an `smbclient -c` script
const SCRIPT_METACHARS: [char; 4] = ['"', ';', '\n', '\r'];

/// Reject SMB paths that cannot be passed safely to `smbclient -c`
pub fn check_url_path(url: &Url) -> Result<()> {
    let decoded = decode(url.path());
    if decoded.contains(SCRIPT_METACHARS) {
        anyhow::bail!("SMB path must not contain '\"', ';' or line breaks: {}", decoded);
    }
    Ok(())
}

/// Double-quote one argument of an `smbclient -c` script
fn quoted(value: &str) -> Result<String> {
    if value.contains(SCRIPT_METACHARS) {
        anyhow::bail!("'{}' contains '\"', ';' or a line break", value);
    }
    Ok(format!("\"{}\"", value))
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Base name of `name` with `:` replaced, since SMB rejects colons in file names
pub fn sanitize_remote_name(name: &str) -> String {
    let replaced = name.replace(':', "-");
    replaced
        .rsplit('/')
        .next()
        .unwrap_or(replaced.as_str())
        .to_string()
}

impl SmbBackend {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub async fn push(
        &self,
        creds: &Credentials,
        destination: &Url,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<u64> {
        let location = SmbLocation::parse(destination)?;
        let auth = SmbAuth::resolve(creds, destination);
        let remote = sanitize_remote_name(remote_name);

        let mut script = String::new();
        if !location.path.is_empty() {
            script.push_str(&format!("cd {}; ", quoted(&location.path)?));
        }
        script.push_str(&format!(
            "put {} {}",
            quoted(&local_path.display().to_string())?,
            quoted(&remote)?
        ));

        debug!(
            "Uploading {} to {}/{}/{}",
            local_path.display(),
            location.service(),
            location.path,
            remote
        );
        self.smbclient(&location, &auth, script).await?;

        let size = tokio::fs::metadata(local_path)
            .await
            .with_context(|| format!("Failed to stat {}", local_path.display()))?
            .len();
        Ok(size)
    }

    pub async fn pull(&self, creds: &Credentials, source: &Url, local_path: &Path) -> Result<u64> {
        let location = SmbLocation::parse(source)?;
        let auth = SmbAuth::resolve(creds, source);
        let (dir, file) = location
            .split_file()
            .ok_or_else(|| anyhow::anyhow!("SMB url does not name a file: {}", source))?;

        let mut script = String::new();
        if !dir.is_empty() {
            script.push_str(&format!("cd {}; ", quoted(dir)?));
        }
        script.push_str(&format!(
            "get {} {}",
            quoted(file)?,
            quoted(&local_path.display().to_string())?
        ));

        debug!(
            "Downloading {}/{} to {}",
            location.service(),
            location.path,
            local_path.display()
        );
        self.smbclient(&location, &auth, script).await?;

        let size = tokio::fs::metadata(local_path)
            .await
            .with_context(|| format!("Downloaded file missing: {}", local_path.display()))?
            .len();
        Ok(size)
    }

    async fn smbclient(&self, location: &SmbLocation, auth: &SmbAuth, script: String) -> Result<()> {
        let mut args = vec![
            location.service(),
            "-p".to_string(),
            location.port.to_string(),
        ];
        let mut envs = Vec::new();

        if auth.is_anonymous() {
            args.push("-N".to_string());
        } else {
            args.push("-U".to_string());
            args.push(auth.user.clone());
            envs.push(("PASSWD".to_string(), auth.password.clone()));
        }
        if let Some(domain) = &auth.domain {
            args.push("-W".to_string());
            args.push(domain.clone());
        }
        args.push("-c".to_string());
        args.push(script);

        self.executor
            .run_command(SMBCLIENT, &args, &envs, None)
            .await
            .with_context(|| format!("smbclient failed for {}", location.service()))?;
        Ok(())
    }
}
