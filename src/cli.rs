// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cmdexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdexec",
    version,
    about = "Run a command with a timeout, cancellation on Ctrl-C and normalized exit codes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to an optional config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Execution timeout in seconds (overrides `[executor].timeout_secs`).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Working directory for the command.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Append stdout to this file instead of capturing it in memory.
    #[arg(long, value_name = "PATH")]
    pub stdout: Option<PathBuf>,

    /// Append stderr to this file instead of capturing it in memory.
    #[arg(long, value_name = "PATH")]
    pub stderr: Option<PathBuf>,

    /// Start the command and supervise it through its live handle instead of
    /// collecting output. No timeout applies.
    #[arg(long)]
    pub detach: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CMDEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config and print what would run, without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Command to run followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
