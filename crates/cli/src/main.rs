//! OtherLink CLI - link-in-bio client

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use otherlink_core::StateDir;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "otherlink")]
#[command(about = "Manage your OtherLink pages from the terminal")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Directory for configuration, session and log files
    #[arg(short = 'd', long, global = true, env = "OTHERLINK_STATE_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to client.toml in the config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Timeout for the whole command in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let state_dir = match &cli.data_dir {
        Some(dir) => StateDir::with_override(dir),
        None => StateDir::new(),
    };
    let log_file = (!cli.no_file_log).then(|| state_dir.log_file());
    logging::init_logging(cli.log_level.into(), log_file)?;

    info!("Starting OtherLink CLI");

    // Long-running commands ignore the timeout
    let timeout = if cli.timeout == 0 || cli.command.is_long_running() {
        None
    } else {
        Some(Duration::from_secs(cli.timeout))
    };
    let run = cli.command.execute(state_dir, cli.config);

    let result = match timeout {
        None => run.await,
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "Command timed out after {} seconds",
                cli.timeout
            )),
        },
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
