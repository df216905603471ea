//! Restore: pull one artifact, unpack it, replay each file in its own transaction

use crate::archive::{self, Compressor};
use crate::database::{Database, Transaction};
use crate::error::{BackupError, Result, TransferError};
use crate::managers::hooks::{run_hooks, HookStage};
use crate::storage::{Credentials, Target};
use crate::utils::executor::{CommandExecutor, RealExecutor};
use crate::utils::locker::StagingLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Fixed name of the downloaded artifact under the work directory
pub const RESTORE_STAGING_FILE: &str = "db-backup-restorefile";

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub target: String,
    pub compressor: Compressor,
    pub work_dir: PathBuf,
    pub pre_restore_scripts: Option<PathBuf>,
    pub post_restore_scripts: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Files replayed and committed
    pub units: usize,
    pub statements: usize,
}

pub struct RestoreEngine {
    database: Arc<dyn Database>,
    credentials: Arc<Credentials>,
    executor: Arc<dyn CommandExecutor>,
}

impl RestoreEngine {
    pub fn new(database: Arc<dyn Database>, credentials: Arc<Credentials>) -> Self {
        Self::with_executor(database, credentials, Arc::new(RealExecutor::new()))
    }

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

    pub async fn restore(&self, options: &RestoreOptions) -> Result<RestoreReport> {
        let target = Target::parse_with_executor(&options.target, self.executor.clone())?;

        let env = HashMap::from([("DB_RESTORE_TARGET".to_string(), options.target.clone())]);
        run_hooks(
            HookStage::PreRestore,
            options.pre_restore_scripts.as_deref(),
            &env,
        )
        .await?;

        std::fs::create_dir_all(&options.work_dir).map_err(|e| {
            BackupError::io(format!("creating work dir {}", options.work_dir.display()), e)
        })?;
        let staging = options.work_dir.join(RESTORE_STAGING_FILE);
        let mut lock = StagingLock::open(&staging).map_err(lock_error)?;
        let _held = lock.try_acquire().map_err(lock_error)?;
        let _cleanup = RemoveOnDrop(staging.clone());

        info!("Pulling {}", target);
        let bytes = target
            .backend()
            .pull(&self.credentials, target.url(), &staging)
            .await
            .map_err(|e| TransferError {
                target: target.to_string(),
                kind: target.kind(),
                message: format!("{:#}", e),
            })?;
        debug!("Pulled {} bytes into {}", bytes, staging.display());

        let extract = tempfile::Builder::new()
            .prefix("db-backup-restore-")
            .tempdir_in(&options.work_dir)
            .map_err(|e| BackupError::io("creating extraction directory", e))?;
        archive::unpack_async(staging.clone(), extract.path().to_path_buf(), options.compressor)
            .await?;

        let files = archive::list_files(extract.path())?;
        info!("Restoring {} file(s)", files.len());

        let mut report = RestoreReport::default();
        let mut failures = Vec::new();
        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match replay_unit(self.database.as_ref(), file).await {
                Ok(statements) => {
                    info!("Restored {} ({} statements)", name, statements);
                    report.units += 1;
                    report.statements += statements;
                }
                Err(e) => {
                    error!("Restore of {} failed: {}", name, e);
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(BackupError::Database {
                operation: "restore".to_string(),
                message: format!(
                    "{} of {} file(s) failed: {}",
                    failures.len(),
                    files.len(),
                    failures.join("; ")
                ),
            });
        }

        run_hooks(
            HookStage::PostRestore,
            options.post_restore_scripts.as_deref(),
            &env,
        )
        .await?;

        Ok(report)
    }
}

/// Replay one extracted file inside a single serializable transaction
pub async fn replay_unit(db: &dyn Database, path: &Path) -> Result<usize> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| BackupError::io(format!("opening {}", path.display()), e))?;
    let tx = db.begin_serializable().await?;
    replay_statements(tx, BufReader::new(file)).await
}

/// Execute every `;`-terminated statement of `reader` in `tx` and commit.
///
/// Statements end at a line whose last character is `;`. Empty lines are
/// skipped. On the first failed statement the transaction is rolled back.
pub async fn replay_statements<R>(mut tx: Box<dyn Transaction>, reader: R) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut pending = String::new();
    let mut executed = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                rollback(tx).await;
                return Err(BackupError::io("reading restore file", e));
            }
        };
        if line.is_empty() {
            continue;
        }

        pending.push_str(&line);
        pending.push('\n');
        if !line.ends_with(';') {
            continue;
        }

        if let Err(e) = tx.execute(&pending).await {
            rollback(tx).await;
            return Err(e);
        }
        executed += 1;
        pending.clear();
    }

    if !pending.trim().is_empty() {
        warn!(
            "Ignoring trailing statement without terminating ';': {}",
            pending.trim()
        );
    }

    tx.commit().await?;
    Ok(executed)
}

async fn rollback(tx: Box<dyn Transaction>) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

fn lock_error(err: anyhow::Error) -> BackupError {
    BackupError::io(
        "locking restore staging file",
        std::io::Error::other(format!("{:#}", err)),
    )
}

/// Removes a file when dropped
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.0.display(), e);
            }
        }
    }
}
