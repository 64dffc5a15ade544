// src/exec/executer.rs

//! Public entry points for running commands.
//!
//! Callers talk to a [`CommandExecuter`] rather than to the process layer
//! directly, so orchestration code can be tested with a fake executer while
//! production uses [`ProcessExecuter`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::errors::ExecError;
use crate::exec::cancel::CancelFlag;
use crate::exec::platform::{NativePlatform, PlatformAdapter};
use crate::exec::process::{
    LAUNCH_FAILED_EXIT_CODE, RunningProcess, execute_command, start_command,
};
use crate::exec::sink::{OutputReader, OutputSink, empty_reader};
use crate::exec::{CommandSpec, OutputPaths};
use crate::identity::IdentityProvider;

/// Outcome of [`CommandExecuter::execute`].
///
/// `errors` is advisory: the readers always carry whatever the command wrote
/// before it exited or was stopped.
pub struct ExecutionResult {
    pub stdout: OutputReader,
    pub stderr: OutputReader,
    pub exit_code: i32,
    pub errors: Vec<ExecError>,
}

impl ExecutionResult {
    /// Result for a call that never launched anything.
    pub fn not_started(error: ExecError) -> Self {
        Self {
            stdout: empty_reader(),
            stderr: empty_reader(),
            exit_code: LAUNCH_FAILED_EXIT_CODE,
            errors: vec![error],
        }
    }
}

impl fmt::Debug for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionResult")
            .field("exit_code", &self.exit_code)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`CommandExecuter::start_exe`]. `exit_code` is provisional:
/// 0 when the process started, 1 when it did not.
#[derive(Debug)]
pub struct StartResult {
    pub process: Option<RunningProcess>,
    pub exit_code: i32,
    pub errors: Vec<ExecError>,
}

pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;
pub type StartFuture<'a> = Pin<Box<dyn Future<Output = StartResult> + Send + 'a>>;

/// Trait abstracting how commands are executed.
pub trait CommandExecuter: Send + Sync {
    /// Run the command to completion and collect its output.
    ///
    /// Output goes to the given files (appended) or, when no path is set, to
    /// memory.
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        outputs: &'a OutputPaths,
        cancel: &'a CancelFlag,
    ) -> ExecuteFuture<'a>;

    /// Start the command and return its live handle without waiting.
    fn start_exe<'a>(
        &'a self,
        spec: &'a CommandSpec,
        outputs: &'a OutputPaths,
        cancel: &'a CancelFlag,
    ) -> StartFuture<'a>;
}

/// Executer backed by real OS processes.
#[derive(Debug, Clone)]
pub struct ProcessExecuter {
    platform: Arc<dyn PlatformAdapter>,
    identity: Arc<dyn IdentityProvider>,
}

impl ProcessExecuter {
    /// Executer for the current OS using the given identity source.
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_platform(Arc::new(NativePlatform), identity)
    }

    pub fn with_platform(
        platform: Arc<dyn PlatformAdapter>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { platform, identity }
    }
}

impl CommandExecuter for ProcessExecuter {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        outputs: &'a OutputPaths,
        cancel: &'a CancelFlag,
    ) -> ExecuteFuture<'a> {
        Box::pin(async move {
            let mut stdout = match OutputSink::open(outputs.stdout.as_deref()) {
                Ok(sink) => sink,
                Err(e) => return ExecutionResult::not_started(e),
            };
            let mut stderr = match OutputSink::open(outputs.stderr.as_deref()) {
                Ok(sink) => sink,
                Err(e) => return ExecutionResult::not_started(e),
            };

            let outcome = execute_command(
                spec,
                self.platform.clone(),
                self.identity.as_ref(),
                cancel,
                &mut stdout,
                &mut stderr,
            )
            .await;

            let mut errors = Vec::new();
            errors.extend(outcome.error);

            let stdout = stdout.into_reader().await.unwrap_or_else(|e| {
                errors.push(e);
                empty_reader()
            });
            let stderr = stderr.into_reader().await.unwrap_or_else(|e| {
                errors.push(e);
                empty_reader()
            });

            debug!(
                exit_code = outcome.exit_code,
                errors = errors.len(),
                "execute finished"
            );

            ExecutionResult {
                stdout,
                stderr,
                exit_code: outcome.exit_code,
                errors,
            }
        })
    }

    fn start_exe<'a>(
        &'a self,
        spec: &'a CommandSpec,
        outputs: &'a OutputPaths,
        cancel: &'a CancelFlag,
    ) -> StartFuture<'a> {
        Box::pin(async move {
            let not_started = |e: ExecError| StartResult {
                process: None,
                exit_code: LAUNCH_FAILED_EXIT_CODE,
                errors: vec![e],
            };

            let mut stdout = match OutputSink::open_detached(outputs.stdout.as_deref()) {
                Ok(sink) => sink,
                Err(e) => return not_started(e),
            };
            let mut stderr = match OutputSink::open_detached(outputs.stderr.as_deref()) {
                Ok(sink) => sink,
                Err(e) => return not_started(e),
            };

            // Our file handles are dropped with the sinks when this returns;
            // the child writes through its own copies.
            match start_command(
                spec,
                self.platform.clone(),
                self.identity.as_ref(),
                cancel,
                &mut stdout,
                &mut stderr,
            ) {
                Ok(process) => StartResult {
                    process: Some(process),
                    exit_code: 0,
                    errors: Vec::new(),
                },
                Err(e) => not_started(e),
            }
        })
    }
}
