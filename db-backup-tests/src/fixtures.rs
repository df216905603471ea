//! Test fixtures and sample data

use chrono::{DateTime, TimeZone, Utc};
use db_backup::archive::{Compressor, FilenamePattern};
use db_backup::managers::dispatcher::DumpOptions;
use db_backup::managers::restore::RestoreOptions;
use std::path::{Path, PathBuf};

/// Fixed cycle time used to make artifact names predictable
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 3, 4, 5)
        .single()
        .expect("valid timestamp")
}

/// Artifact name produced by the default pattern at [`fixed_now`]
pub fn fixed_artifact(compressor: Compressor) -> String {
    FilenamePattern::default().render(fixed_now(), compressor, false)
}

/// Dump options with no hooks and the given targets
pub fn dump_options(work_dir: &Path, targets: &[String]) -> DumpOptions {
    DumpOptions {
        targets: targets.to_vec(),
        work_dir: work_dir.to_path_buf(),
        pre_backup_scripts: None,
        post_backup_scripts: None,
        ..Default::default()
    }
}

/// Restore options with no hooks
pub fn restore_options(work_dir: &Path, target: &str, compressor: Compressor) -> RestoreOptions {
    RestoreOptions {
        target: target.to_string(),
        compressor,
        work_dir: work_dir.to_path_buf(),
        pre_restore_scripts: None,
        post_restore_scripts: None,
    }
}

/// Minimal valid config TOML
pub fn minimal_config_toml() -> &'static str {
    r#"
[database]
server = "db.example.com"
user = "backup"
pass = "secret"

[dump]
targets = ["/backups"]
"#
}

/// Write an executable shell hook `name` into `dir`
#[cfg(unix)]
pub fn write_hook(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).expect("Failed to create hook directory");
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write hook");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make hook executable");
    path
}
