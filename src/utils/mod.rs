pub mod command;
pub mod cron;
pub mod locker;

// Trait-based abstractions for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
#[allow(unused_imports)]
pub use executor::{CommandExecutor, RealExecutor};
