use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db_backup::config::{self, Config};
use db_backup::database::mysql::{find_mysqldump, MySqlDatabase};
use db_backup::managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
use db_backup::managers::scheduler::{SchedulePolicy, Scheduler};
use db_backup::storage::{parse_targets, smb::SMBCLIENT, BackendKind, Target};
use db_backup::utils::executor::{CommandExecutor, RealExecutor};
use db_backup::{Dispatcher, RestoreEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "db-backup")]
#[command(about = "Scheduled MySQL backups to file, SMB and S3 targets", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/db-backup/config.toml")]
    config: PathBuf,

    /// Log at debug level on the console
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the database to every target, on the configured schedule
    Dump {
        /// Target URL (repeatable); replaces the configured targets
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Run a single backup and exit
        #[arg(long)]
        once: bool,
    },

    /// Restore the database from one backup artifact
    Restore {
        /// URL of the artifact to restore
        #[arg(short, long)]
        target: String,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => {
            init_console_logging(cli.debug);
            handle_validate(&cli.config)
        }
        Commands::Dump { targets, once } => {
            let (config, _log_guard) = load_with_logging(&cli.config, cli.debug)?;
            handle_dump(&config, &targets, once).await
        }
        Commands::Restore { target } => {
            let (config, _log_guard) = load_with_logging(&cli.config, cli.debug)?;
            handle_restore(&config, &target).await
        }
    }
}

/// Load the config and start file logging as it describes
fn load_with_logging(path: &std::path::Path, debug: bool) -> Result<(Config, LogGuard)> {
    let config = config::load_config(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;

    let logging_config = LoggingConfig::from_config(
        &config.global.log_directory,
        &config.global.log_level,
        config.global.log_max_files,
        debug,
    );
    let guard = init_logging(&logging_config)?;
    Ok((config, guard))
}

fn handle_validate(path: &std::path::Path) -> Result<()> {
    let config = config::load_config(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    let policy = SchedulePolicy::from_options(&config.timer_options(false))?;

    println!("Configuration is valid!");
    println!("Database: {}:{}", config.database.server, config.database.port);
    println!("Compression: {}", config.global.compression);
    println!("Schedule: {}", policy);
    println!("Targets: {}", config.dump.targets.len());
    for raw in &config.dump.targets {
        let target = Target::parse(raw)?;
        println!("  {} ({})", target, target.kind());
    }
    Ok(())
}

async fn handle_dump(config: &Config, cli_targets: &[String], once: bool) -> Result<()> {
    let options = config.dump_options(cli_targets)?;
    let targets = parse_targets(&options.targets)?;
    let policy = SchedulePolicy::from_options(&config.timer_options(once))?;

    let mysqldump = find_mysqldump()?;
    if targets.iter().any(|t| t.kind() == BackendKind::Smb) {
        require_smbclient()?;
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
    let database = MySqlDatabase::new(&config.database, executor.clone())
        .with_dump_program(mysqldump.display().to_string());
    let dispatcher = Dispatcher::with_executor(
        Arc::new(database),
        Arc::new(config.credentials()),
        executor,
    );

    info!(
        "Backing up to {} target(s), {}",
        targets.len(),
        policy
    );

    let scheduler = Scheduler::new(policy);
    scheduler
        .run_with_shutdown(
            || {
                let dispatcher = &dispatcher;
                let options = &options;
                async move {
                    let report = dispatcher.run_cycle(options).await?.into_result()?;
                    info!(
                        "Backup {} ({} bytes) completed",
                        report.artifact, report.size
                    );
                    Ok(())
                }
            },
            shutdown_signal(),
        )
        .await?;

    Ok(())
}

async fn handle_restore(config: &Config, raw_target: &str) -> Result<()> {
    let target = Target::parse(raw_target)?;
    if target.kind() == BackendKind::Smb {
        require_smbclient()?;
    }

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());
    let database = MySqlDatabase::new(&config.database, executor.clone());
    let engine = RestoreEngine::with_executor(
        Arc::new(database),
        Arc::new(config.credentials()),
        executor,
    );

    let report = engine.restore(&config.restore_options(raw_target)?).await?;
    println!(
        "✓ Restore completed: {} file(s), {} statement(s)",
        report.units, report.statements
    );
    Ok(())
}

fn require_smbclient() -> Result<PathBuf> {
    which::which(SMBCLIENT).context(
        "smbclient executable not found in PATH. Please install the Samba client tools to use smb:// targets.",
    )
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => {
            warn!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
