//! Backup cycles against local file targets

use db_backup::archive::{self, Compressor};
use db_backup::error::BackupError;
use db_backup::storage::BackendKind;
use db_backup::Dispatcher;
use std::sync::Arc;
use test_utils::{
    dump_options, dump_script, fixed_artifact, fixed_now, Credentials, FakeDatabase, TestContext,
};

fn dispatcher(db: &FakeDatabase) -> Dispatcher {
    Dispatcher::new(Arc::new(db.clone()), Arc::new(Credentials::default()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_combined_dump_reaches_every_target() {
    let ctx = TestContext::new();
    let first = ctx.create_subdir("nas");
    let second = ctx.create_subdir("offsite");
    let db = FakeDatabase::with_schemas(&["mysql", "shop", "blog", "information_schema"]);

    let options = dump_options(
        &ctx.temp_dir().join("work"),
        &[first.display().to_string(), format!("file://{}", second.display())],
    );
    let report = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap();

    let artifact = fixed_artifact(Compressor::Gzip);
    assert_eq!(report.artifact, artifact);
    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 2);
    assert!(report.succeeded.iter().all(|s| s.bytes == report.size));
    assert_eq!(db.dump_calls(), vec![strings(&["shop", "blog"])]);
    assert_eq!(ctx.list_dir(&first), vec![artifact.clone()]);
    assert_eq!(ctx.list_dir(&second), vec![artifact.clone()]);
    assert_eq!(
        std::fs::read(first.join(&artifact)).unwrap(),
        std::fs::read(second.join(&artifact)).unwrap()
    );

    // The single dump lands in the archive as all_<timestamp>.sql
    let out = ctx.create_subdir("out");
    archive::unpack(&first.join(&artifact), &out, Compressor::Gzip).unwrap();
    assert_eq!(ctx.list_dir(&out), vec!["all_2024-05-17T03:04:05Z.sql"]);
    assert_eq!(
        std::fs::read_to_string(out.join("all_2024-05-17T03:04:05Z.sql")).unwrap(),
        dump_script(&strings(&["shop", "blog"]))
    );
}

#[tokio::test]
async fn test_by_schema_dump_packs_one_file_per_schema() {
    let ctx = TestContext::new();
    let target = ctx.create_subdir("nas");
    let db = FakeDatabase::with_schemas(&["shop", "blog", "scratch"]);

    let mut options = dump_options(&ctx.temp_dir().join("work"), &[target.display().to_string()]);
    options.by_schema = true;
    options.safechars = true;
    options.compressor = Compressor::Bzip2;
    options.schemas.exclude = strings(&["scratch"]);

    let report = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap();
    assert_eq!(report.artifact, "db_backup_2024-05-17T03-04-05Z.tbz2");
    assert_eq!(db.dump_calls(), vec![strings(&["shop"]), strings(&["blog"])]);

    let out = ctx.create_subdir("out");
    archive::unpack(&target.join(&report.artifact), &out, Compressor::Bzip2).unwrap();
    assert_eq!(
        ctx.list_dir(&out),
        vec![
            "blog_2024-05-17T03-04-05Z.sql",
            "shop_2024-05-17T03-04-05Z.sql"
        ]
    );
}

#[tokio::test]
async fn test_one_failing_target_does_not_block_others() {
    let ctx = TestContext::new();
    let good = ctx.create_subdir("good");
    let missing = ctx.temp_dir().join("does-not-exist");
    let db = FakeDatabase::with_schemas(&["shop"]);

    let mut options = dump_options(
        &ctx.temp_dir().join("work"),
        &[missing.display().to_string(), good.display().to_string()],
    );
    options.max_parallel_transfers = 1;

    let report = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap();
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, BackendKind::File);
    assert!(report.failures[0].target.contains("does-not-exist"));
    assert_eq!(ctx.list_dir(&good).len(), 1);

    match report.into_result().unwrap_err() {
        BackupError::Targets(errors) => {
            assert_eq!(errors.failures.len(), 1);
            assert_eq!(errors.succeeded.len(), 1);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_dump_failure_aborts_before_any_push() {
    let ctx = TestContext::new();
    let target = ctx.create_subdir("nas");
    let db = FakeDatabase::with_schemas(&["shop"]).failing_dump();

    let options = dump_options(&ctx.temp_dir().join("work"), &[target.display().to_string()]);
    let err = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap_err();

    assert!(matches!(err, BackupError::Database { .. }));
    assert!(ctx.list_dir(&target).is_empty());
}

#[tokio::test]
async fn test_no_schemas_is_an_error() {
    let ctx = TestContext::new();
    let target = ctx.create_subdir("nas");
    let db = FakeDatabase::with_schemas(&["mysql", "sys"]);

    let options = dump_options(&ctx.temp_dir().join("work"), &[target.display().to_string()]);
    let err = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap_err();
    assert!(err.to_string().contains("no schemas"));
    assert!(db.dump_calls().is_empty());
}

#[tokio::test]
async fn test_empty_target_list_is_config_error() {
    let ctx = TestContext::new();
    let db = FakeDatabase::with_schemas(&["shop"]);
    let options = dump_options(ctx.temp_dir(), &[]);

    let err = dispatcher(&db).run_cycle(&options).await.unwrap_err();
    assert!(err.is_config());
    assert!(db.dump_calls().is_empty());
}

#[tokio::test]
async fn test_staging_directory_is_removed_after_cycle() {
    let ctx = TestContext::new();
    let target = ctx.create_subdir("nas");
    let work = ctx.temp_dir().join("work");
    let db = FakeDatabase::with_schemas(&["shop"]);

    let options = dump_options(&work, &[target.display().to_string()]);
    dispatcher(&db).run_cycle(&options).await.unwrap();

    assert!(work.is_dir());
    assert!(ctx.list_dir(&work).is_empty());
}

#[tokio::test]
async fn test_bounded_pool_delivers_to_all_targets() {
    let ctx = TestContext::new();
    let targets: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| ctx.create_subdir(name))
        .collect();
    let db = FakeDatabase::with_schemas(&["shop"]);

    let mut options = dump_options(
        &ctx.temp_dir().join("work"),
        &targets
            .iter()
            .map(|t| t.display().to_string())
            .collect::<Vec<_>>(),
    );
    options.max_parallel_transfers = 2;

    let report = dispatcher(&db).run_cycle_at(&options, fixed_now()).await.unwrap();
    assert_eq!(report.succeeded.len(), 4);
    // Results come back in target order
    for (success, target) in report.succeeded.iter().zip(&targets) {
        assert!(success.target.ends_with(&target.display().to_string()));
    }
}
