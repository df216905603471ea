//! Tests for the checks behind the 'validate' command

use db_backup::config::{load_config, ConfigError};
use db_backup::managers::scheduler::SchedulePolicy;
use db_backup::storage::{parse_targets, BackendKind};
use test_utils::{ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_validate_valid_config() {
    let (path, _config, _temp_dir) = ConfigBuilder::minimal()
        .add_target("smb://nas/backups/mysql")
        .add_target("s3://bucket/mysql")
        .with_cron("0 2 * * *")
        .write();

    let config = load_config(&path).assert_ok();
    let targets = parse_targets(&config.dump.targets).assert_ok();
    let kinds: Vec<_> = targets.iter().map(|t| t.kind()).collect();
    assert_eq!(kinds, vec![BackendKind::File, BackendKind::Smb, BackendKind::S3]);

    let policy = SchedulePolicy::from_options(&config.timer_options(false)).assert_ok();
    assert_eq!(policy.to_string(), "cron '0 2 * * *'");
}

#[test]
fn test_validate_rejects_bad_cron() {
    let (path, _config, _temp_dir) = ConfigBuilder::minimal().with_cron("0 25 * * *").write();
    assert!(matches!(
        load_config(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_validate_rejects_unknown_compression() {
    let (path, _config, _temp_dir) = ConfigBuilder::minimal().with_compression("xz").write();
    load_config(&path).assert_err_contains("xz");
}

#[test]
fn test_validate_rejects_bad_pattern() {
    let (path, _config, _temp_dir) = ConfigBuilder::minimal()
        .with_filename_pattern("backup_{{ .now ")
        .write();
    assert!(load_config(&path).is_err());
}

#[test]
fn test_validate_missing_database_section() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        r#"
[dump]
targets = ["/backups"]
"#,
    );
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_validate_empty_config() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", "");
    assert!(load_config(&path).is_err());
}
