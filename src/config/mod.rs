//! Configuration for db-backup
//!
//! Settings come from one TOML file with `[global]`, `[database]`,
//! `[credentials]`, `[dump]`, `[schedule]` and `[restore]` sections. Everything
//! except `database.server` has a default.
//!
//! ## Example Usage
//!
//! ```no_run
//! use db_backup::config;
//!
//! let config = config::load_config("db-backup.toml")?;
//! let options = config.dump_options(&[])?;
//! println!("Dumping to {} target(s)", options.targets.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_config, validate_config, ConfigError, Result};
pub use types::*;

use crate::archive::{Compressor, FilenamePattern};
use crate::database::SchemaFilter;
use crate::managers::dispatcher::DumpOptions;
use crate::managers::restore::RestoreOptions;
use crate::managers::scheduler::TimerOptions;
use crate::storage::Credentials;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl Config {
    pub fn compressor(&self) -> crate::error::Result<Compressor> {
        Compressor::from_name(&self.global.compression)
    }

    pub fn work_dir(&self) -> PathBuf {
        expand_tilde(&self.global.work_dir)
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.global.transfer_timeout_seconds.map(Duration::from_secs)
    }

    /// Storage credentials, with the SMB user and password joined as `user%password`
    pub fn credentials(&self) -> Credentials {
        let creds = &self.credentials;
        let smb_credentials = non_empty(&creds.smb_user).map(|user| {
            match creds.smb_pass.as_deref().filter(|p| !p.is_empty()) {
                Some(pass) => format!("{}%{}", user, pass),
                None => user,
            }
        });

        Credentials {
            s3_endpoint: non_empty(&creds.s3_endpoint_url),
            s3_region: non_empty(&creds.s3_region),
            s3_access_key_id: non_empty(&creds.s3_access_key_id),
            s3_secret_access_key: non_empty(&creds.s3_secret_access_key),
            smb_credentials,
        }
    }

    /// Options for a backup cycle; non-empty `cli_targets` replace the configured targets
    pub fn dump_options(&self, cli_targets: &[String]) -> crate::error::Result<DumpOptions> {
        let targets = if cli_targets.is_empty() {
            self.dump.targets.clone()
        } else {
            cli_targets.to_vec()
        };

        Ok(DumpOptions {
            targets,
            schemas: SchemaFilter::new(self.dump.include.clone(), self.dump.exclude.clone()),
            by_schema: self.dump.by_schema,
            compressor: self.compressor()?,
            filename_pattern: FilenamePattern::parse(&self.dump.filename_pattern)?,
            safechars: self.dump.safechars,
            work_dir: self.work_dir(),
            pre_backup_scripts: self.dump.pre_backup_scripts.clone(),
            post_backup_scripts: self.dump.post_backup_scripts.clone(),
            max_parallel_transfers: self.dump.max_parallel_transfers,
            transfer_timeout: self.transfer_timeout(),
        })
    }

    pub fn timer_options(&self, force_once: bool) -> TimerOptions {
        TimerOptions {
            once: force_once || self.schedule.once,
            cron: non_empty(&self.schedule.cron),
            begin: self.schedule.begin.clone(),
            frequency: self.schedule.frequency,
        }
    }

    pub fn restore_options(&self, target: &str) -> crate::error::Result<RestoreOptions> {
        Ok(RestoreOptions {
            target: target.to_string(),
            compressor: self.compressor()?,
            work_dir: self.work_dir(),
            pre_restore_scripts: self.restore.pre_restore_scripts.clone(),
            post_restore_scripts: self.restore.post_restore_scripts.clone(),
        })
    }
}
