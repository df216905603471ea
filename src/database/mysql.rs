//! MySQL collaborator: `mysqldump` for dumps, `sqlx` for listing and replay

use super::{Database, Transaction};
use crate::config::DatabaseConfig;
use crate::error::{BackupError, Result};
use crate::utils::executor::CommandExecutor;
use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Executor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const MYSQLDUMP: &str = "mysqldump";

/// Locate `mysqldump` on `PATH`
pub fn find_mysqldump() -> anyhow::Result<PathBuf> {
    use anyhow::Context;
    which::which(MYSQLDUMP).context(
        "mysqldump executable not found in PATH. Please ensure the MySQL client tools are installed.",
    )
}

pub struct MySqlDatabase {
    pool: MySqlPool,
    host: String,
    port: u16,
    user: String,
    pass: String,
    dump_program: String,
    executor: Arc<dyn CommandExecutor>,
}

impl MySqlDatabase {
    /// Build a lazily connecting pool whose sessions run at serializable isolation
    pub fn new(config: &DatabaseConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.server)
            .port(config.port)
            .username(&config.user);
        if !config.pass.is_empty() {
            options = options.password(&config.pass);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                        .await?;
                    Ok(())
                })
            })
            .connect_lazy_with(options);

        Self {
            pool,
            host: config.server.clone(),
            port: config.port,
            user: config.user.clone(),
            pass: config.pass.clone(),
            dump_program: MYSQLDUMP.to_string(),
            executor,
        }
    }

    /// Use a resolved path for the dump tool instead of a `PATH` lookup at spawn time
    pub fn with_dump_program(mut self, program: impl Into<String>) -> Self {
        self.dump_program = program.into();
        self
    }

    fn dump_args(&self, schemas: &[String]) -> Vec<String> {
        let mut args = vec![
            format!("--host={}", self.host),
            format!("--port={}", self.port),
            format!("--user={}", self.user),
            "--single-transaction".to_string(),
            // binary columns as hex literals so the dump stays valid UTF-8 for replay
            "--hex-blob".to_string(),
            "--default-character-set=utf8mb4".to_string(),
            // trigger bodies need DELIMITER handling that the replay splitter lacks
            "--skip-triggers".to_string(),
            "--databases".to_string(),
        ];
        args.extend(schemas.iter().cloned());
        args
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SHOW DATABASES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BackupError::database("listing schemas", e))
    }

    async fn dump(&self, schemas: &[String], output: &Path) -> Result<u64> {
        if schemas.is_empty() {
            return Err(BackupError::database("dump", "no schemas selected"));
        }

        info!("Dumping {} to {}", schemas.join(", "), output.display());
        let envs = vec![("MYSQL_PWD".to_string(), self.pass.clone())];
        let written = self
            .executor
            .run_command_to_file(
                &self.dump_program,
                &self.dump_args(schemas),
                &envs,
                output,
                None,
            )
            .await
            .map_err(|e| {
                BackupError::database(format!("dump of {}", schemas.join(", ")), format!("{:#}", e))
            })?;

        debug!("Dump wrote {} bytes", written);
        Ok(written)
    }

    async fn begin_serializable(&self) -> Result<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BackupError::database("begin transaction", e))?;
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        self.tx
            .execute(sqlx::raw_sql(statement))
            .await
            .map_err(|e| BackupError::database("execute statement", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| BackupError::database("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| BackupError::database("rollback", e))
    }
}
