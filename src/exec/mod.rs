// src/exec/mod.rs

//! Process execution layer.
//!
//! This module launches one external command per call, races its natural
//! exit against cancellation and a timeout, and reports a normalized exit code
//! together with the output it produced.
//!
//! - [`cancel`] holds the cooperative [`CancelFlag`] observed by the executor.
//! - [`sink`] decides where stdout/stderr go and turns them into readers.
//! - [`platform`] contains the OS-specific process-group, environment and kill
//!   handling behind the [`PlatformAdapter`] trait.
//! - [`process`] owns the launch/wait/kill state machine and exit-code
//!   normalization.
//! - [`executer`] provides the [`CommandExecuter`] trait and the production
//!   [`ProcessExecuter`], which callers (and fakes in tests) program against.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub mod cancel;
pub mod executer;
pub mod platform;
pub mod process;
pub mod sink;

pub use cancel::{CancelFlag, CancelState};
pub use executer::{CommandExecuter, ExecutionResult, ProcessExecuter, StartResult};
pub use platform::{NativePlatform, PlatformAdapter, TimeoutSignal};
pub use process::{
    ExitOutcome, KillContext, LAUNCH_FAILED_EXIT_CODE, RawExit, RunningProcess,
    STOPPED_PREEMPTIVELY_EXIT_CODE, UNATTRIBUTED_KILL_EXIT_CODE, normalize_exit,
};
pub use sink::{OutputReader, OutputSink};

/// What to run, where, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Passed verbatim to process creation; `None` inherits the agent's cwd.
    pub working_dir: Option<PathBuf>,
    pub command: String,
    pub args: Vec<String>,
    /// Ignored by `start_exe`, whose caller manages the process lifetime.
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(command: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            working_dir: None,
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Optional output files. A missing path means "capture in memory" for
/// `execute` and "discard" for `start_exe`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

impl OutputPaths {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn files(stdout: impl Into<PathBuf>, stderr: impl Into<PathBuf>) -> Self {
        Self {
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
        }
    }
}
