//! Test utilities for db-backup
//!
//! Shared fixtures for the test suites: an in-memory [`FakeDatabase`] that
//! stands in for MySQL, a [`ConfigBuilder`] that lays out a throwaway work
//! directory, and a [`TestContext`] with file helpers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, FakeDatabase, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::from_builder(ConfigBuilder::minimal());
//!     let db = FakeDatabase::with_schemas(&["shop"]);
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fake_database;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fake_database::{dump_script, schema_statements, FakeDatabase, FakeState};
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use db_backup::config::{
    Config, CredentialsConfig, DatabaseConfig, DumpConfig, GlobalConfig, RestoreConfig,
    ScheduleConfig,
};
pub use db_backup::database::{Database, SchemaFilter, Transaction};
pub use db_backup::storage::Credentials;

// Re-export mock implementations from the main crate
pub use db_backup::utils::executor::mock::{CommandCall, MockExecutor, MockResponse};
pub use db_backup::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
