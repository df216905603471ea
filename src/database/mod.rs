//! Database collaborator used by the dispatcher and the restore engine

pub mod mysql;

pub use mysql::MySqlDatabase;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Schemas that are never dumped unless named in the include list
pub const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "performance_schema", "sys", "mysql"];

#[async_trait]
pub trait Database: Send + Sync {
    /// Every schema visible on the server
    async fn list_schemas(&self) -> Result<Vec<String>>;

    /// Write one SQL stream covering `schemas` to `output`, returning bytes written
    async fn dump(&self, schemas: &[String], output: &Path) -> Result<u64>;

    /// Open a transaction at serializable isolation
    async fn begin_serializable(&self) -> Result<Box<dyn Transaction>>;
}

#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, statement: &str) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Which schemas a dump covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SchemaFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Resolve the schema list, asking the server only when nothing is explicitly included
    pub async fn select(&self, db: &dyn Database) -> Result<Vec<String>> {
        let candidates = if self.include.is_empty() {
            db.list_schemas()
                .await?
                .into_iter()
                .filter(|s| !SYSTEM_SCHEMAS.contains(&s.as_str()))
                .collect()
        } else {
            self.include.clone()
        };

        let selected: Vec<String> = candidates
            .into_iter()
            .filter(|s| !self.exclude.contains(s))
            .collect();
        debug!("Selected schemas: {:?}", selected);
        Ok(selected)
    }
}
