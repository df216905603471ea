//! Builder for test configurations
//!
//! Every path the configuration touches (work dir, logs, hook directories,
//! file targets) lives inside one temporary directory owned by the builder.

use db_backup::config::{
    Config, CredentialsConfig, DatabaseConfig, DumpConfig, GlobalConfig, RestoreConfig,
    ScheduleConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    database: DatabaseConfig,
    credentials: CredentialsConfig,
    dump: DumpConfig,
    schedule: ScheduleConfig,
    restore: RestoreConfig,
}

impl ConfigBuilder {
    /// A config with no targets; hook directories point at empty locations in the temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let hooks = root.join("scripts.d");

        let global = GlobalConfig {
            work_dir: root.join("work"),
            log_directory: root.join("logs"),
            ..Default::default()
        };

        let dump = DumpConfig {
            pre_backup_scripts: Some(hooks.join("pre-backup")),
            post_backup_scripts: Some(hooks.join("post-backup")),
            ..Default::default()
        };

        let restore = RestoreConfig {
            pre_restore_scripts: Some(hooks.join("pre-restore")),
            post_restore_scripts: Some(hooks.join("post-restore")),
        };

        Self {
            temp_dir,
            global,
            database: DatabaseConfig {
                server: "localhost".to_string(),
                port: 3306,
                user: "root".to_string(),
                pass: "secret".to_string(),
            },
            credentials: CredentialsConfig::default(),
            dump,
            schedule: ScheduleConfig::default(),
            restore,
        }
    }

    /// A config with one local file target
    pub fn minimal() -> Self {
        Self::new().add_local_target("backups")
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create `name` under the temp dir and add it as a bare-path target
    pub fn add_local_target(mut self, name: &str) -> Self {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path).expect("Failed to create target dir");
        self.dump.targets.push(path.display().to_string());
        self
    }

    /// Add a target URL as-is
    pub fn add_target(mut self, url: &str) -> Self {
        self.dump.targets.push(url.to_string());
        self
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.database.server = server.to_string();
        self
    }

    pub fn with_compression(mut self, compression: &str) -> Self {
        self.global.compression = compression.to_string();
        self
    }

    pub fn with_transfer_timeout(mut self, seconds: u64) -> Self {
        self.global.transfer_timeout_seconds = Some(seconds);
        self
    }

    pub fn with_by_schema(mut self, by_schema: bool) -> Self {
        self.dump.by_schema = by_schema;
        self
    }

    pub fn with_safechars(mut self, safechars: bool) -> Self {
        self.dump.safechars = safechars;
        self
    }

    pub fn with_include(mut self, schemas: &[&str]) -> Self {
        self.dump.include = schemas.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_exclude(mut self, schemas: &[&str]) -> Self {
        self.dump.exclude = schemas.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_filename_pattern(mut self, pattern: &str) -> Self {
        self.dump.filename_pattern = pattern.to_string();
        self
    }

    pub fn with_max_parallel_transfers(mut self, max: usize) -> Self {
        self.dump.max_parallel_transfers = max;
        self
    }

    pub fn with_smb_credentials(mut self, user: &str, pass: &str) -> Self {
        self.credentials.smb_user = Some(user.to_string());
        self.credentials.smb_pass = Some(pass.to_string());
        self
    }

    pub fn with_s3_endpoint(mut self, endpoint: &str) -> Self {
        self.credentials.s3_endpoint_url = Some(endpoint.to_string());
        self
    }

    pub fn run_once(mut self) -> Self {
        self.schedule.once = true;
        self
    }

    pub fn with_cron(mut self, cron: &str) -> Self {
        self.schedule.cron = Some(cron.to_string());
        self
    }

    pub fn with_interval(mut self, begin: &str, frequency: u32) -> Self {
        self.schedule.begin = begin.to_string();
        self.schedule.frequency = frequency;
        self
    }

    /// Build the configuration; the temp dir is dropped with the builder
    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Build the configuration and hand over the temp dir that backs it
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            database: self.database,
            credentials: self.credentials,
            dump: self.dump,
            schedule: self.schedule,
            restore: self.restore,
        };
        (config, self.temp_dir)
    }

    /// Serialize the configuration to `config.toml` in the temp dir
    pub fn write(self) -> (PathBuf, Config, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("config.toml");
        let contents = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config");
        (path, config, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
