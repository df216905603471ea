//! In-memory stand-in for a MySQL server
//!
//! Dumps write a small deterministic SQL script per schema. Transactions record
//! every statement they execute and publish them on commit, so a restore can be
//! checked against exactly what was dumped.

use async_trait::async_trait;
use db_backup::database::{Database, Transaction};
use db_backup::error::{BackupError, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Everything the fake observed
#[derive(Debug, Default, Clone)]
pub struct FakeState {
    /// Schema lists passed to each `dump` call, in call order
    pub dumps: Vec<Vec<String>>,
    /// Statements executed successfully, committed or not
    pub executed: Vec<String>,
    /// Statements of committed transactions
    pub committed: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Clone, Default)]
pub struct FakeDatabase {
    schemas: Vec<String>,
    state: Arc<Mutex<FakeState>>,
    fail_dump: bool,
    failing_statement: Option<String>,
}

impl FakeDatabase {
    pub fn with_schemas(schemas: &[&str]) -> Self {
        Self {
            schemas: schemas.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Make every dump fail
    pub fn failing_dump(mut self) -> Self {
        self.fail_dump = true;
        self
    }

    /// Fail any statement containing `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.failing_statement = Some(needle.to_string());
        self
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().clone()
    }

    pub fn dump_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().dumps.clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.state.lock().committed.clone()
    }
}

/// The statements a dump of `schema` contains, as replay will see them
pub fn schema_statements(schema: &str) -> Vec<String> {
    vec![
        format!("CREATE TABLE `{}`.`items` (\n  `id` INT\n);\n", schema),
        format!("INSERT INTO `{}`.`items` VALUES (1),(2);\n", schema),
    ]
}

/// SQL text for a dump of `schemas`, with blank lines between statements
pub fn dump_script(schemas: &[String]) -> String {
    let mut script = String::new();
    for schema in schemas {
        for statement in schema_statements(schema) {
            script.push_str(&statement);
            script.push('\n');
        }
    }
    script
}

#[async_trait]
impl Database for FakeDatabase {
    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(self.schemas.clone())
    }

    async fn dump(&self, schemas: &[String], output: &Path) -> Result<u64> {
        self.state.lock().dumps.push(schemas.to_vec());
        if self.fail_dump {
            return Err(BackupError::database("dump", "server went away"));
        }

        let script = dump_script(schemas);
        std::fs::write(output, &script)
            .map_err(|e| BackupError::io(format!("writing {}", output.display()), e))?;
        Ok(script.len() as u64)
    }

    async fn begin_serializable(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(FakeTransaction {
            state: self.state.clone(),
            failing_statement: self.failing_statement.clone(),
            statements: Vec::new(),
        }))
    }
}

struct FakeTransaction {
    state: Arc<Mutex<FakeState>>,
    failing_statement: Option<String>,
    statements: Vec<String>,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        if let Some(needle) = &self.failing_statement {
            if statement.contains(needle.as_str()) {
                return Err(BackupError::database("execute", "syntax error"));
            }
        }
        self.state.lock().executed.push(statement.to_string());
        self.statements.push(statement.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let FakeTransaction {
            state, statements, ..
        } = *self;
        let mut state = state.lock();
        state.commits += 1;
        state.committed.extend(statements);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.lock().rollbacks += 1;
        Ok(())
    }
}
