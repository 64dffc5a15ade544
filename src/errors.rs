// src/errors.rs

//! Crate-wide error types.
//!
//! - [`CmdexecError`] covers configuration and setup failures at the edges
//!   (config file, CLI wiring).
//! - [`ExecError`] is the vocabulary of a single command execution. Only
//!   `SinkSetup` and `Launch` abort a call; everything else is collected into
//!   the result next to whatever output was captured.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmdexecError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to read config file at {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors produced while executing one command.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The output file could not be opened or created; nothing was launched.
    #[error("failed to open output file {path:?}: {source}")]
    SinkSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The OS refused to create the process.
    #[error("failed to start command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Waiting on the child failed at the OS level.
    #[error("failed to wait for command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("command exited with status {code}")]
    NonZeroExit { code: i32 },

    #[error("command was canceled")]
    Canceled,

    #[error("command timed out after {after:?}")]
    TimedOut { after: Duration },

    /// Terminated by something this crate did not initiate.
    #[error("command was killed by an external signal")]
    Killed,

    /// The output file disappeared or became unreadable after the run.
    #[error("failed to read back output file {path:?}: {source}")]
    ReadBack {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    /// True for the errors that stop a call before any process runs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::SinkSetup { .. } | ExecError::Launch { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CmdexecError>;
