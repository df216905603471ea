//! Backup cycle: hooks, dump, packaging and fan-out to every target

use crate::archive::{self, dump_file_name, timestamp, Compressor, FilenamePattern};
use crate::database::{Database, SchemaFilter};
use crate::error::{BackupError, Result, TargetErrors, TransferError};
use crate::managers::hooks::{run_hooks, HookStage};
use crate::storage::{Credentials, Target};
use crate::utils::executor::{CommandExecutor, RealExecutor};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Everything one backup cycle needs besides its collaborators
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub targets: Vec<String>,
    pub schemas: SchemaFilter,
    pub by_schema: bool,
    pub compressor: Compressor,
    pub filename_pattern: FilenamePattern,
    pub safechars: bool,
    /// Parent of the per-cycle staging directory
    pub work_dir: PathBuf,
    pub pre_backup_scripts: Option<PathBuf>,
    pub post_backup_scripts: Option<PathBuf>,
    /// Upper bound on concurrent pushes; 0 means one per target
    pub max_parallel_transfers: usize,
    pub transfer_timeout: Option<Duration>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            schemas: SchemaFilter::default(),
            by_schema: false,
            compressor: Compressor::default(),
            filename_pattern: FilenamePattern::default(),
            safechars: false,
            work_dir: std::env::temp_dir(),
            pre_backup_scripts: None,
            post_backup_scripts: None,
            max_parallel_transfers: 0,
            transfer_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSuccess {
    pub target: String,
    pub bytes: u64,
}

/// Outcome of one cycle once every push has been attempted
#[derive(Debug)]
pub struct CycleReport {
    pub artifact: String,
    pub size: u64,
    pub succeeded: Vec<TargetSuccess>,
    pub failures: Vec<TransferError>,
    pub post_hook_error: Option<BackupError>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.post_hook_error.is_none()
    }

    /// Fold transfer failures (or else a post-backup hook failure) into an error
    pub fn into_result(self) -> Result<CycleReport> {
        if !self.failures.is_empty() {
            return Err(BackupError::Targets(TargetErrors {
                failures: self.failures,
                succeeded: self.succeeded.into_iter().map(|s| s.target).collect(),
            }));
        }
        match self.post_hook_error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

pub struct Dispatcher {
    database: Arc<dyn Database>,
    credentials: Arc<Credentials>,
    executor: Arc<dyn CommandExecutor>,
}

impl Dispatcher {
    pub fn new(database: Arc<dyn Database>, credentials: Arc<Credentials>) -> Self {
        Self::with_executor(database, credentials, Arc::new(RealExecutor::new()))
    }

    /// Route SMB tool invocations through `executor`
    pub fn with_executor(
        database: Arc<dyn Database>,
        credentials: Arc<Credentials>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            database,
            credentials,
            executor,
        }
    }

    pub async fn run_cycle(&self, options: &DumpOptions) -> Result<CycleReport> {
        self.run_cycle_at(options, Utc::now()).await
    }

    /// Run one cycle stamping the artifact with `now`
    pub async fn run_cycle_at(
        &self,
        options: &DumpOptions,
        now: DateTime<Utc>,
    ) -> Result<CycleReport> {
        if options.targets.is_empty() {
            return Err(BackupError::config("must provide at least one target"));
        }
        let targets = options
            .targets
            .iter()
            .map(|raw| Target::parse_with_executor(raw, self.executor.clone()))
            .collect::<Result<Vec<_>>>()?;

        std::fs::create_dir_all(&options.work_dir).map_err(|e| {
            BackupError::io(format!("creating work dir {}", options.work_dir.display()), e)
        })?;
        let staging = tempfile::Builder::new()
            .prefix("db-backup-")
            .tempdir_in(&options.work_dir)
            .map_err(|e| BackupError::io("creating staging directory", e))?;
        debug!("Staging cycle in {}", staging.path().display());

        let mut env = HashMap::from([
            (
                "NOW".to_string(),
                now.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("DB_DUMP_TARGETS".to_string(), options.targets.join(" ")),
            ("DB_DUMP_BY_SCHEMA".to_string(), options.by_schema.to_string()),
        ]);

        run_hooks(
            HookStage::PreBackup,
            options.pre_backup_scripts.as_deref(),
            &env,
        )
        .await?;

        let dumps = self.dump(options, now, staging.path()).await?;

        let artifact = options
            .filename_pattern
            .render(now, options.compressor, options.safechars);
        let artifact_path = staging.path().join(&artifact);
        let size = archive::pack_async(dumps, artifact_path.clone(), options.compressor).await?;
        info!("Created artifact {} ({} bytes)", artifact, size);

        let (succeeded, failures) = self
            .push_all(targets, &artifact, &artifact_path, options)
            .await;

        env.insert(
            "DB_DUMP_FILE".to_string(),
            artifact_path.display().to_string(),
        );
        env.insert(
            "DB_DUMP_DIR".to_string(),
            staging.path().display().to_string(),
        );
        let post_hook_error = run_hooks(
            HookStage::PostBackup,
            options.post_backup_scripts.as_deref(),
            &env,
        )
        .await
        .err();

        if failures.is_empty() {
            info!(
                "Backup {} delivered to {} target(s)",
                artifact,
                succeeded.len()
            );
        } else {
            warn!(
                "Backup {} failed for {} of {} target(s)",
                artifact,
                failures.len(),
                failures.len() + succeeded.len()
            );
        }

        Ok(CycleReport {
            artifact,
            size,
            succeeded,
            failures,
            post_hook_error,
        })
    }

    /// Produce the SQL files to package, one per schema or one for all
    async fn dump(
        &self,
        options: &DumpOptions,
        now: DateTime<Utc>,
        staging: &Path,
    ) -> Result<Vec<PathBuf>> {
        let schemas = options.schemas.select(self.database.as_ref()).await?;
        if schemas.is_empty() {
            return Err(BackupError::database("schema selection", "no schemas to dump"));
        }

        let dump_dir = staging.join("dump");
        std::fs::create_dir(&dump_dir)
            .map_err(|e| BackupError::io(format!("creating {}", dump_dir.display()), e))?;
        let stamp = timestamp(now, options.safechars);

        let mut files = Vec::new();
        if options.by_schema {
            for schema in &schemas {
                let path = dump_dir.join(dump_file_name(Some(schema), &stamp));
                self.database
                    .dump(std::slice::from_ref(schema), &path)
                    .await?;
                files.push(path);
            }
        } else {
            let path = dump_dir.join(dump_file_name(None, &stamp));
            self.database.dump(&schemas, &path).await?;
            files.push(path);
        }

        Ok(files)
    }

    async fn push_all(
        &self,
        targets: Vec<Target>,
        artifact: &str,
        artifact_path: &Path,
        options: &DumpOptions,
    ) -> (Vec<TargetSuccess>, Vec<TransferError>) {
        let workers = worker_count(targets.len(), options.max_parallel_transfers);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        for (index, target) in targets.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let credentials = self.credentials.clone();
            let artifact = artifact.to_string();
            let artifact_path = artifact_path.to_path_buf();
            let timeout = options.transfer_timeout;

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome =
                    push_one(&target, &credentials, &artifact, &artifact_path, timeout).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<std::result::Result<u64, String>>> =
            vec![None; targets.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!("Transfer task ended abnormally: {}", e),
            }
        }

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Some(Ok(bytes)) => {
                    info!("Pushed {} to {} ({} bytes)", artifact, target, bytes);
                    succeeded.push(TargetSuccess {
                        target: target.to_string(),
                        bytes,
                    });
                }
                Some(Err(message)) => {
                    error!("Push to {} failed: {}", target, message);
                    failures.push(TransferError {
                        target: target.to_string(),
                        kind: target.kind(),
                        message,
                    });
                }
                None => failures.push(TransferError {
                    target: target.to_string(),
                    kind: target.kind(),
                    message: "transfer task panicked".to_string(),
                }),
            }
        }

        (succeeded, failures)
    }
}

/// Pool size: one worker per target unless capped
fn worker_count(targets: usize, max_parallel: usize) -> usize {
    match max_parallel {
        0 => targets.max(1),
        cap => cap.min(targets).max(1),
    }
}

async fn push_one(
    target: &Target,
    credentials: &Credentials,
    artifact: &str,
    artifact_path: &Path,
    timeout: Option<Duration>,
) -> std::result::Result<u64, String> {
    let transfer = target
        .backend()
        .push(credentials, target.url(), artifact, artifact_path);

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, transfer).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("transfer timed out after {:?}", limit)),
        },
        None => transfer.await,
    };

    result.map_err(|e| format!("{:#}", e))
}
