use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 5] = [
    "otherlink",
    "otherlink_core",
    "otherlink_http",
    "otherlink_session",
    "otherlink_mock",
];

/// Initialize logging for the CLI
///
/// `RUST_LOG` takes precedence over `level`. Logs always go to stderr, and
/// additionally to `log_file` when one is given.
pub fn init_logging(level: Level, log_file: Option<PathBuf>) -> Result<()> {
    match log_file {
        Some(path) => init_file_logging(level, &path),
        None => init_stderr_logging(level),
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(level).into())
}

fn default_directives(level: Level) -> String {
    let level_str = level.as_str().to_lowercase();
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level_str}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_file_logging(level: Level, log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_file_path)?;

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn init_stderr_logging(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_every_crate() {
        let directives = default_directives(Level::DEBUG);
        assert_eq!(directives.split(',').count(), CRATES.len());
        assert!(directives.contains("otherlink_session=debug"));
        assert!(directives.starts_with("otherlink=debug"));
    }
}
