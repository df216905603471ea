//! Integration tests for db-backup
//!
//! These tests require Docker and the MySQL client tools (`mysqldump`) on PATH.
//! Run with: `cargo test -p db-backup-tests --test integration -- --ignored`
