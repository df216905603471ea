//! Restore from artifacts produced by real backup cycles

use db_backup::archive::Compressor;
use db_backup::error::BackupError;
use db_backup::managers::restore::RESTORE_STAGING_FILE;
use db_backup::storage::BackendKind;
use db_backup::utils::locker::StagingLock;
use db_backup::{Dispatcher, RestoreEngine};
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{
    dump_options, fixed_now, restore_options, schema_statements, Credentials, FakeDatabase,
    TestContext,
};

/// Run one backup of `schemas` into `<temp>/nas` and return the artifact path
async fn backup(
    ctx: &TestContext,
    schemas: &[&str],
    by_schema: bool,
    compressor: Compressor,
) -> PathBuf {
    let target = ctx.create_subdir("nas");
    let source = FakeDatabase::with_schemas(schemas);

    let mut options = dump_options(
        &ctx.temp_dir().join("backup-work"),
        &[target.display().to_string()],
    );
    options.by_schema = by_schema;
    options.compressor = compressor;

    let dispatcher = Dispatcher::new(Arc::new(source), Arc::new(Credentials::default()));
    let report = dispatcher.run_cycle_at(&options, fixed_now()).await.unwrap();
    target.join(report.artifact)
}

fn engine(db: &FakeDatabase) -> RestoreEngine {
    RestoreEngine::new(Arc::new(db.clone()), Arc::new(Credentials::default()))
}

#[tokio::test]
async fn test_combined_backup_restores_in_one_transaction() {
    let ctx = TestContext::new();
    let artifact = backup(&ctx, &["shop", "blog"], false, Compressor::Gzip).await;
    let work = ctx.temp_dir().join("restore-work");
    let db = FakeDatabase::default();

    let options = restore_options(&work, &artifact.display().to_string(), Compressor::Gzip);
    let report = engine(&db).restore(&options).await.unwrap();

    assert_eq!(report.units, 1);
    assert_eq!(report.statements, 4);
    let expected: Vec<String> = schema_statements("shop")
        .into_iter()
        .chain(schema_statements("blog"))
        .collect();
    assert_eq!(db.committed(), expected);
    assert_eq!(db.state().commits, 1);

    // Staging file, lock and extraction directory are all cleaned up
    assert!(ctx.list_dir(&work).is_empty());
}

#[tokio::test]
async fn test_per_schema_backup_restores_each_file_separately() {
    let ctx = TestContext::new();
    let artifact = backup(&ctx, &["shop", "blog"], true, Compressor::Bzip2).await;
    let db = FakeDatabase::default();

    let target = format!("file://{}", artifact.display());
    let options = restore_options(&ctx.temp_dir().join("restore-work"), &target, Compressor::Bzip2);
    let report = engine(&db).restore(&options).await.unwrap();

    assert_eq!(report.units, 2);
    assert_eq!(db.state().commits, 2);
    // Files replay in name order: blog_* before shop_*
    let expected: Vec<String> = schema_statements("blog")
        .into_iter()
        .chain(schema_statements("shop"))
        .collect();
    assert_eq!(db.committed(), expected);
}

#[tokio::test]
async fn test_failed_file_rolls_back_and_others_still_restore() {
    let ctx = TestContext::new();
    let artifact = backup(&ctx, &["shop", "blog"], true, Compressor::Gzip).await;
    let db = FakeDatabase::default().failing_on("INSERT INTO `blog`");

    let options = restore_options(
        &ctx.temp_dir().join("restore-work"),
        &artifact.display().to_string(),
        Compressor::Gzip,
    );
    let err = engine(&db).restore(&options).await.unwrap_err();

    match &err {
        BackupError::Database { operation, message } => {
            assert_eq!(operation, "restore");
            assert!(message.starts_with("1 of 2 file(s) failed"));
            assert!(message.contains("blog_"));
        }
        other => panic!("unexpected error: {}", other),
    }

    let state = db.state();
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.commits, 1);
    assert_eq!(state.committed, schema_statements("shop"));
}

#[tokio::test]
async fn test_missing_artifact_is_transfer_error() {
    let ctx = TestContext::new();
    let work = ctx.temp_dir().join("restore-work");
    let db = FakeDatabase::default();

    let missing = ctx.temp_dir().join("nas").join("nope.tgz");
    let options = restore_options(&work, &missing.display().to_string(), Compressor::Gzip);
    let err = engine(&db).restore(&options).await.unwrap_err();

    match err {
        BackupError::Transfer(transfer) => {
            assert_eq!(transfer.kind, BackendKind::File);
            assert!(transfer.target.contains("nope.tgz"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(ctx.list_dir(&work).is_empty());
}

#[tokio::test]
async fn test_wrong_compression_fails_without_replay() {
    let ctx = TestContext::new();
    let artifact = backup(&ctx, &["shop"], false, Compressor::Gzip).await;
    let db = FakeDatabase::default();

    let options = restore_options(
        &ctx.temp_dir().join("restore-work"),
        &artifact.display().to_string(),
        Compressor::Bzip2,
    );
    assert!(engine(&db).restore(&options).await.is_err());
    assert_eq!(db.state().commits, 0);
    assert!(db.state().executed.is_empty());
}

#[tokio::test]
async fn test_unknown_scheme_is_config_error() {
    let ctx = TestContext::new();
    let db = FakeDatabase::default();
    let options = restore_options(ctx.temp_dir(), "ftp://host/db.tgz", Compressor::Gzip);

    assert!(engine(&db).restore(&options).await.unwrap_err().is_config());
}

#[tokio::test]
async fn test_concurrent_restore_is_refused() {
    let ctx = TestContext::new();
    let artifact = backup(&ctx, &["shop"], false, Compressor::Gzip).await;
    let work = ctx.create_subdir("restore-work");
    let db = FakeDatabase::default();

    let mut held = StagingLock::open(&work.join(RESTORE_STAGING_FILE)).unwrap();
    let _guard = held.try_acquire().unwrap();

    let options = restore_options(&work, &artifact.display().to_string(), Compressor::Gzip);
    let err = engine(&db).restore(&options).await.unwrap_err();
    assert!(matches!(err, BackupError::Io { .. }));
    assert!(db.state().executed.is_empty());
}

#[cfg(unix)]
mod hooks {
    use super::*;
    use db_backup::managers::hooks::HookStage;
    use test_utils::write_hook;

    #[tokio::test]
    async fn test_restore_hooks_run_around_replay() {
        let ctx = TestContext::new();
        let artifact = backup(&ctx, &["shop"], false, Compressor::Gzip).await;
        let pre = ctx.temp_dir().join("pre-restore");
        let post = ctx.temp_dir().join("post-restore");
        let seen = ctx.temp_dir().join("seen");
        let done = ctx.temp_dir().join("done");
        write_hook(
            &pre,
            "10-seen.sh",
            &format!("echo \"$DB_RESTORE_TARGET\" > {}", seen.display()),
        );
        write_hook(&post, "10-done.sh", &format!("touch {}", done.display()));

        let db = FakeDatabase::default();
        let raw = artifact.display().to_string();
        let mut options =
            restore_options(&ctx.temp_dir().join("restore-work"), &raw, Compressor::Gzip);
        options.pre_restore_scripts = Some(pre);
        options.post_restore_scripts = Some(post);

        engine(&db).restore(&options).await.unwrap();
        assert_eq!(std::fs::read_to_string(&seen).unwrap().trim(), raw);
        assert!(done.exists());
    }

    #[tokio::test]
    async fn test_pre_restore_failure_stops_before_pull() {
        let ctx = TestContext::new();
        let artifact = backup(&ctx, &["shop"], false, Compressor::Gzip).await;
        let pre = ctx.temp_dir().join("pre-restore");
        write_hook(&pre, "10-fail.sh", "exit 2");
        let work = ctx.temp_dir().join("restore-work");

        let db = FakeDatabase::default();
        let mut options = restore_options(&work, &artifact.display().to_string(), Compressor::Gzip);
        options.pre_restore_scripts = Some(pre);

        let err = engine(&db).restore(&options).await.unwrap_err();
        assert!(matches!(
            err,
            BackupError::Hook {
                stage: HookStage::PreRestore,
                ..
            }
        ));
        assert!(!work.exists());
        assert!(db.state().executed.is_empty());
    }

    #[tokio::test]
    async fn test_post_restore_hooks_skipped_when_a_file_fails() {
        let ctx = TestContext::new();
        let artifact = backup(&ctx, &["shop"], false, Compressor::Gzip).await;
        let post = ctx.temp_dir().join("post-restore");
        let done = ctx.temp_dir().join("done");
        write_hook(&post, "10-done.sh", &format!("touch {}", done.display()));

        let db = FakeDatabase::default().failing_on("CREATE TABLE");
        let mut options = restore_options(
            &ctx.temp_dir().join("restore-work"),
            &artifact.display().to_string(),
            Compressor::Gzip,
        );
        options.post_restore_scripts = Some(post);

        assert!(engine(&db).restore(&options).await.is_err());
        assert!(!done.exists());
    }
}
