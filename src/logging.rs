//! Tracing setup for arbor.
//!
//! `RUST_LOG` wins when set. Otherwise the filter is built from
//! [`LoggingConfig`]: the base level, `sqlx=warn` unless the level is `debug`
//! or finer (sqlx logs every statement at `info`), then the configured
//! per-target directives such as `arbor::bucket=debug`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{ArborError, Result};

const SQLX_QUIET: &str = "sqlx=warn";

fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "warning" => Ok(LevelFilter::WARN),
        other => other
            .parse()
            .map_err(|_| ArborError::Config(format!("unknown log level '{level}'"))),
    }
}

fn parse_directive(directive: &str) -> Result<Directive> {
    directive
        .parse()
        .map_err(|e| ArborError::Config(format!("invalid log directive '{directive}': {e}")))
}

fn base_filter(level: LevelFilter) -> Result<EnvFilter> {
    let filter = EnvFilter::default().add_directive(level.into());
    if level < LevelFilter::DEBUG {
        Ok(filter.add_directive(parse_directive(SQLX_QUIET)?))
    } else {
        Ok(filter)
    }
}

/// Build the filter described by `config`, ignoring `RUST_LOG`.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = base_filter(parse_level(&config.level)?)?;
    for directive in &config.directives {
        filter = filter.add_directive(parse_directive(directive)?);
    }
    Ok(filter)
}

fn open_log_file(path: &str) -> Result<Arc<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(Arc::new(File::create(path)?))
}

/// Install the global subscriber.
///
/// Logs always go to the configured file and, when `console` is set, to
/// stdout as well.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config)?,
    };

    let log_file = open_log_file(&config.file)?;
    let writer = if config.console {
        BoxMakeWriter::new(std::io::stdout.and(log_file))
    } else {
        BoxMakeWriter::new(log_file)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .map_err(|e| ArborError::Config(format!("logging already initialized: {e}")))
}

/// Console-only logging at `level`, used when [`init`] fails.
///
/// An unknown level falls back to `info`.
pub fn init_console_only(level: &str) {
    let level = parse_level(level).unwrap_or(LevelFilter::INFO);
    let filter =
        base_filter(level).unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
