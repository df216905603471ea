//! Command tests for db-backup
//!
//! These drive full backup cycles, restores and the scheduler against a fake
//! database, local file targets and a mocked `smbclient`.

mod dump;
mod restore;
mod schedule;
mod validate;
