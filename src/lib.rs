//! db-backup library
//!
//! Scheduled MySQL dumps delivered to local, SMB and S3 targets, and the
//! matching restore.

pub mod archive;
pub mod config;
pub mod database;
pub mod error;
pub mod managers;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config};
pub use error::{BackupError, Result};
pub use managers::dispatcher::{CycleReport, Dispatcher, DumpOptions};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::restore::{RestoreEngine, RestoreOptions, RestoreReport};
pub use managers::scheduler::{SchedulePolicy, Scheduler};
