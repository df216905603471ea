use super::types::*;
use crate::archive::{Compressor, FilenamePattern};
use crate::managers::scheduler::Begin;
use crate::storage::Target;
use crate::utils::cron::CronSchedule;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Check every setting that would otherwise fail at the start of a run
pub fn validate_config(config: &Config) -> Result<()> {
    if config.database.server.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.server must not be empty".to_string(),
        ));
    }

    Compressor::from_name(&config.global.compression).map_err(validation)?;

    if config.global.transfer_timeout_seconds == Some(0) {
        return Err(ConfigError::ValidationError(
            "transfer_timeout_seconds must be greater than zero".to_string(),
        ));
    }

    FilenamePattern::parse(&config.dump.filename_pattern).map_err(validation)?;

    for target in &config.dump.targets {
        Target::parse(target).map_err(validation)?;
    }

    validate_schedule(&config.schedule)
}

/// Only the inputs of the policy that wins (once, then cron, then interval) are checked
fn validate_schedule(schedule: &ScheduleConfig) -> Result<()> {
    if schedule.once {
        return Ok(());
    }

    if let Some(cron) = schedule.cron.as_deref().filter(|c| !c.trim().is_empty()) {
        return CronSchedule::parse(cron)
            .map(|_| ())
            .map_err(|e| ConfigError::ValidationError(e.to_string()));
    }

    Begin::parse(&schedule.begin).map_err(validation)?;

    if schedule.frequency == 0 {
        return Err(ConfigError::ValidationError(
            "schedule.frequency must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validation(err: crate::error::BackupError) -> ConfigError {
    ConfigError::ValidationError(match err {
        crate::error::BackupError::Config(message) => message,
        other => other.to_string(),
    })
}
