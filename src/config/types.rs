use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub dump: DumpConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Base directory for staging artifacts and restore downloads
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// `gzip` or `bzip2`
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Deadline for each individual push or pull
    #[serde(default)]
    pub transfer_timeout_seconds: Option<u64>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            compression: default_compression(),
            transfer_timeout_seconds: None,
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// MySQL connection settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub server: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

/// Storage credentials shared by every target
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    /// Alternative S3 endpoint (MinIO, DigitalOcean Spaces, ...)
    #[serde(default)]
    pub s3_endpoint_url: Option<String>,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub s3_access_key_id: Option<String>,
    #[serde(default)]
    pub s3_secret_access_key: Option<String>,

    /// SMB user, optionally `DOMAIN;user`
    #[serde(default)]
    pub smb_user: Option<String>,
    #[serde(default)]
    pub smb_pass: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DumpConfig {
    /// Destination URLs; the CLI `--target` flags replace these
    #[serde(default)]
    pub targets: Vec<String>,

    /// Schemas to dump; empty means every non-system schema
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Replace `:` in timestamps with `-`
    #[serde(default)]
    pub safechars: bool,

    /// One SQL file per schema instead of a combined dump
    #[serde(default)]
    pub by_schema: bool,

    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    #[serde(default = "default_pre_backup_scripts")]
    pub pre_backup_scripts: Option<PathBuf>,
    #[serde(default = "default_post_backup_scripts")]
    pub post_backup_scripts: Option<PathBuf>,

    /// Concurrent pushes; 0 runs one worker per target
    #[serde(default)]
    pub max_parallel_transfers: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            safechars: false,
            by_schema: false,
            filename_pattern: default_filename_pattern(),
            pre_backup_scripts: default_pre_backup_scripts(),
            post_backup_scripts: default_post_backup_scripts(),
            max_parallel_transfers: 0,
        }
    }
}

/// When to run; `once` wins over `cron`, which wins over `begin`/`frequency`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub cron: Option<String>,
    /// `HHMM` or `+MM`
    #[serde(default = "default_begin")]
    pub begin: String,
    /// Minutes between runs
    #[serde(default = "default_frequency")]
    pub frequency: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            once: false,
            cron: None,
            begin: default_begin(),
            frequency: default_frequency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestoreConfig {
    #[serde(default = "default_pre_restore_scripts")]
    pub pre_restore_scripts: Option<PathBuf>,
    #[serde(default = "default_post_restore_scripts")]
    pub post_restore_scripts: Option<PathBuf>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            pre_restore_scripts: default_pre_restore_scripts(),
            post_restore_scripts: default_post_restore_scripts(),
        }
    }
}

// Default value functions
fn default_work_dir() -> PathBuf { std::env::temp_dir() }
fn default_compression() -> String { "gzip".to_string() }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_db_port() -> u16 { 3306 }
fn default_filename_pattern() -> String { crate::archive::DEFAULT_FILENAME_PATTERN.to_string() }
fn default_pre_backup_scripts() -> Option<PathBuf> { Some(PathBuf::from("/scripts.d/pre-backup")) }
fn default_post_backup_scripts() -> Option<PathBuf> { Some(PathBuf::from("/scripts.d/post-backup")) }
fn default_pre_restore_scripts() -> Option<PathBuf> { Some(PathBuf::from("/scripts.d/pre-restore")) }
fn default_post_restore_scripts() -> Option<PathBuf> { Some(PathBuf::from("/scripts.d/post-restore")) }
fn default_begin() -> String { crate::managers::scheduler::DEFAULT_BEGIN.to_string() }
fn default_frequency() -> u32 { crate::managers::scheduler::DEFAULT_FREQUENCY_MINUTES }
