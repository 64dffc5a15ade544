// src/logging.rs

//! Logging setup for `cmdexec` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen in this order:
//! 1. `--log-level` CLI flag, applied to every target
//! 2. `CMDEXEC_LOG`, read as an `EnvFilter` directive list
//!    (e.g. `debug` or `cmdexec::exec=trace,warn`)
//! 3. `info`
//!
//! Logs go to STDERR so that stdout carries only the command's output.

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "CMDEXEC_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, directives: Option<&str>) -> EnvFilter {
    let default = EnvFilter::default().add_directive(LevelFilter::INFO.into());

    if let Some(lvl) = cli_level {
        return EnvFilter::default().add_directive(level_filter(lvl).into());
    }

    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => EnvFilter::try_new(d).unwrap_or_else(|e| {
            eprintln!("ignoring invalid {LOG_ENV_VAR}={d:?}: {e}");
            default
        }),
        None => default,
    }
}

fn level_filter(lvl: LogLevel) -> LevelFilter {
    match lvl {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}
