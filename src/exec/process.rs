// src/exec/process.rs

//! Launch, supervise and reap a single child process.
//!
//! While the child runs, three things race:
//!
//! 1. the child's own exit, awaited by the caller's task,
//! 2. a cancellation observer parked on [`CancelFlag::wait`],
//! 3. a timeout observer parked on a deadline.
//!
//! Observers (2) and (3) only ever kill the process tree; it is the child
//! exiting that unblocks the call. The observers share nothing except the
//! idempotent [`PlatformAdapter::kill_process`] and the atomic interrupted
//! flag in [`TimeoutSignal`]. Once the child is reaped a "done" channel is
//! closed so both observers return promptly.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::errors::ExecError;
use crate::exec::cancel::{CancelFlag, CancelState};
use crate::exec::platform::{PlatformAdapter, TimeoutSignal};
use crate::exec::sink::OutputSink;
use crate::exec::CommandSpec;
use crate::identity::IdentityProvider;

/// Exit code reported when the process could not be started (or waited on).
pub const LAUNCH_FAILED_EXIT_CODE: i32 = 1;
/// Exit code reported when cancellation or timeout stopped the process:
/// fatal error (128) + SIGKILL (9).
pub const STOPPED_PREEMPTIVELY_EXIT_CODE: i32 = 137;
/// Raw code of a process killed by something this crate did not initiate.
pub const UNATTRIBUTED_KILL_EXIT_CODE: i32 = -1;

/// Deadlines further out than this are clamped so the addition cannot
/// overflow.
const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// How the child ended, as far as the OS tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawExit {
    Success,
    Code(i32),
    /// Terminated by a signal, no exit code available.
    Signaled,
}

impl From<ExitStatus> for RawExit {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            RawExit::Success
        } else {
            match status.code() {
                Some(code) => RawExit::Code(code),
                None => RawExit::Signaled,
            }
        }
    }
}

/// What the observers saw during the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KillContext {
    /// The platform kill marked the status as unreliable.
    pub interrupted: bool,
    pub canceled: bool,
    /// The deadline passed before the child exited.
    pub timed_out: bool,
    pub timeout: Duration,
}

/// Normalized result of one run.
#[derive(Debug)]
pub struct ExitOutcome {
    pub exit_code: i32,
    pub error: Option<ExecError>,
}

impl ExitOutcome {
    fn new(exit_code: i32, error: Option<ExecError>) -> Self {
        Self { exit_code, error }
    }
}

/// Map a raw exit plus the observers' view onto the executor's exit-code
/// vocabulary.
pub fn normalize_exit(raw: RawExit, ctx: &KillContext) -> ExitOutcome {
    let mut exit_code = match raw {
        RawExit::Success => {
            // SIGKILL cannot be ignored, so this only happens when the kill
            // lost the race against a process that was already finishing.
            if ctx.canceled {
                error!("the cancellation failed to stop the process");
            }
            if ctx.timed_out {
                error!("the timeout failed to stop the process");
            }
            return ExitOutcome::new(0, None);
        }
        RawExit::Code(code) => code,
        RawExit::Signaled => UNATTRIBUTED_KILL_EXIT_CODE,
    };

    if ctx.interrupted {
        debug!(raw_exit_code = exit_code, "command interrupted by cancel or timeout");
        exit_code = UNATTRIBUTED_KILL_EXIT_CODE;
    }

    if exit_code != UNATTRIBUTED_KILL_EXIT_CODE {
        info!(exit_code, "the execution of command returned a non-zero exit status");
        return ExitOutcome::new(exit_code, Some(ExecError::NonZeroExit { code: exit_code }));
    }

    if ctx.canceled {
        info!("the execution of command was cancelled");
        ExitOutcome::new(STOPPED_PREEMPTIVELY_EXIT_CODE, Some(ExecError::Canceled))
    } else if ctx.timed_out {
        info!(timeout = ?ctx.timeout, "the execution of command timed out");
        ExitOutcome::new(
            STOPPED_PREEMPTIVELY_EXIT_CODE,
            Some(ExecError::TimedOut { after: ctx.timeout }),
        )
    } else {
        info!("the command was killed by an external signal");
        ExitOutcome::new(UNATTRIBUTED_KILL_EXIT_CODE, Some(ExecError::Killed))
    }
}

/// Build the OS command with platform setup, environment and output wiring
/// applied.
fn build_command(
    spec: &CommandSpec,
    platform: &dyn PlatformAdapter,
    identity: &dyn IdentityProvider,
    stdout: Stdio,
    stderr: Stdio,
) -> Command {
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    platform.prepare_process(&mut cmd);

    let env = platform.prepare_environment(spec, identity);
    cmd.env_clear().envs(env);
    cmd
}

/// Spawn the command, or report the launch failure.
fn spawn(
    spec: &CommandSpec,
    platform: &dyn PlatformAdapter,
    identity: &dyn IdentityProvider,
    stdout: Stdio,
    stderr: Stdio,
) -> Result<Child, ExecError> {
    debug!(
        working_dir = ?spec.working_dir,
        command = %spec,
        "starting command"
    );

    // The command (and our copies of any output file handles it holds) is
    // dropped on return; the child keeps its own duplicates.
    let mut cmd = build_command(spec, platform, identity, stdout, stderr);
    cmd.spawn().map_err(|source| {
        error!(command = %spec.command, error = %source, "error occurred starting the command");
        ExecError::Launch {
            command: spec.command.clone(),
            source,
        }
    })
}

/// Run `spec` to completion, writing output into the given sinks.
///
/// Returns the normalized exit outcome. Output captured before a kill stays
/// in the sinks either way.
pub async fn execute_command(
    spec: &CommandSpec,
    platform: Arc<dyn PlatformAdapter>,
    identity: &dyn IdentityProvider,
    cancel: &CancelFlag,
    stdout: &mut OutputSink,
    stderr: &mut OutputSink,
) -> ExitOutcome {
    let mut child = match spawn(
        spec,
        platform.as_ref(),
        identity,
        stdout.stdio(),
        stderr.stdio(),
    ) {
        Ok(child) => child,
        Err(e) => return ExitOutcome::new(LAUNCH_FAILED_EXIT_CODE, Some(e)),
    };

    stdout.capture(child.stdout.take());
    stderr.capture(child.stderr.take());

    let signal = Arc::new(TimeoutSignal::new());
    let (done_tx, done_rx) = watch::channel(());

    let observers = child.id().map(|pid| {
        let on_cancel = tokio::spawn(kill_on_cancel(
            pid,
            cancel.clone(),
            platform.clone(),
            signal.clone(),
            done_rx.clone(),
        ));
        let on_timeout = tokio::spawn(kill_on_timeout(
            pid,
            spec.timeout,
            platform.clone(),
            signal.clone(),
            done_rx,
        ));
        (on_cancel, on_timeout)
    });

    let waited = child.wait().await;

    // Release both observers, then collect whether the deadline had passed.
    drop(done_tx);
    let timed_out = match observers {
        Some((on_cancel, on_timeout)) => {
            let timed_out = on_timeout.await.unwrap_or_else(|e| {
                warn!(error = %e, "timeout observer failed");
                false
            });
            if let Err(e) = on_cancel.await {
                warn!(error = %e, "cancellation observer failed");
            }
            timed_out
        }
        None => false,
    };

    let outcome = match waited {
        Ok(status) => {
            let ctx = KillContext {
                interrupted: signal.was_interrupted(),
                canceled: cancel.is_canceled(),
                timed_out,
                timeout: spec.timeout,
            };
            normalize_exit(RawExit::from(status), &ctx)
        }
        Err(source) => {
            debug!(error = %source, "command failed to run");
            ExitOutcome::new(
                LAUNCH_FAILED_EXIT_CODE,
                Some(ExecError::Wait {
                    command: spec.command.clone(),
                    source,
                }),
            )
        }
    };

    debug!(exit_code = outcome.exit_code, "done waiting");
    outcome
}

/// Wait for a cancel request and kill the process tree when it arrives.
///
/// Returns without action once `done` closes, or when the flag moves to a
/// state other than `Canceled`. `done` is checked first: once the child is
/// reaped its pid may be reused.
async fn kill_on_cancel(
    pid: u32,
    cancel: CancelFlag,
    platform: Arc<dyn PlatformAdapter>,
    signal: Arc<TimeoutSignal>,
    mut done: watch::Receiver<()>,
) {
    tokio::select! {
        biased;
        _ = done.changed() => {}
        state = cancel.wait() => {
            if state != CancelState::Canceled {
                return;
            }
            debug!(pid, "process cancelled; attempting to stop process");
            match platform.kill_process(pid, &signal).await {
                Ok(()) => debug!(pid, "process stopped successfully"),
                Err(e) => error!(pid, error = %e, "failed to stop process on cancellation"),
            }
        }
    }
}

/// Kill the process tree once `timeout` elapses.
///
/// Returns whether the deadline passed before `done` closed; that is the
/// signal used to attribute a late exit to the timeout. A deadline that ties
/// with the exit counts as passed but sends no signal.
async fn kill_on_timeout(
    pid: u32,
    timeout: Duration,
    platform: Arc<dyn PlatformAdapter>,
    signal: Arc<TimeoutSignal>,
    mut done: watch::Receiver<()>,
) -> bool {
    let deadline = Instant::now() + timeout.min(MAX_TIMEOUT);
    tokio::select! {
        biased;
        _ = done.changed() => Instant::now() >= deadline,
        () = sleep_until(deadline) => {
            debug!(pid, ?timeout, "process exceeded timeout; attempting to stop process");
            match platform.kill_process(pid, &signal).await {
                Ok(()) => debug!(pid, "process stopped successfully"),
                Err(e) => error!(pid, error = %e, "failed to stop process on timeout"),
            }
            true
        }
    }
}

/// A child started by [`start_command`] and handed to the caller.
///
/// A cancellation watcher runs alongside it. The watcher stops as soon as the
/// process is reaped through [`RunningProcess::wait`] or
/// [`RunningProcess::try_wait`], or when the handle is dropped. After that
/// point [`RunningProcess::kill`] no longer signals the pid.
#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    pid: Option<u32>,
    command: String,
    cancel: CancelFlag,
    platform: Arc<dyn PlatformAdapter>,
    signal: Arc<TimeoutSignal>,
    done: Option<watch::Sender<()>>,
    watcher: Option<JoinHandle<()>>,
    /// Set once the OS has handed back the exit status.
    reaped: bool,
}

impl RunningProcess {
    /// OS process id captured at spawn time.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for exit and normalize the status like `execute` does. There is
    /// no timeout on this path.
    pub async fn wait(&mut self) -> ExitOutcome {
        let waited = self.child.wait().await;
        if waited.is_ok() {
            self.reaped = true;
        }
        self.release_watcher().await;

        match waited {
            Ok(status) => {
                let ctx = KillContext {
                    interrupted: self.signal.was_interrupted(),
                    canceled: self.cancel.is_canceled(),
                    timed_out: false,
                    timeout: Duration::ZERO,
                };
                normalize_exit(RawExit::from(status), &ctx)
            }
            Err(source) => ExitOutcome::new(
                LAUNCH_FAILED_EXIT_CODE,
                Some(ExecError::Wait {
                    command: self.command.clone(),
                    source,
                }),
            ),
        }
    }

    /// Non-blocking poll; releases the watcher once the process has exited.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
            self.done.take();
        }
        Ok(status)
    }

    /// Kill the process tree. A no-op once the process has been reaped.
    pub async fn kill(&self) -> std::io::Result<()> {
        match self.pid {
            Some(pid) if !self.reaped => self.platform.kill_process(pid, &self.signal).await,
            Some(pid) => {
                debug!(pid, "process already reaped; not signalling");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether the exit status has been collected.
    pub fn is_reaped(&self) -> bool {
        self.reaped
    }

    async fn release_watcher(&mut self) {
        self.done.take();
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                warn!(error = %e, "cancellation watcher failed");
            }
        }
    }
}

/// Start `spec` without waiting for it.
///
/// Only a cancellation watcher is attached; the caller owns the process
/// lifetime, so no timeout is enforced.
pub fn start_command(
    spec: &CommandSpec,
    platform: Arc<dyn PlatformAdapter>,
    identity: &dyn IdentityProvider,
    cancel: &CancelFlag,
    stdout: &mut OutputSink,
    stderr: &mut OutputSink,
) -> Result<RunningProcess, ExecError> {
    let child = spawn(
        spec,
        platform.as_ref(),
        identity,
        stdout.stdio(),
        stderr.stdio(),
    )?;

    let pid = child.id();
    let signal = Arc::new(TimeoutSignal::new());
    let (done_tx, done_rx) = watch::channel(());
    let watcher = pid.map(|pid| {
        tokio::spawn(kill_on_cancel(
            pid,
            cancel.clone(),
            platform.clone(),
            signal.clone(),
            done_rx,
        ))
    });

    info!(pid = ?pid, command = %spec.command, "started command");

    Ok(RunningProcess {
        child,
        pid,
        command: spec.command.clone(),
        cancel: cancel.clone(),
        platform,
        signal,
        done: Some(done_tx),
        watcher,
        reaped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::platform::KillFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter that records kill requests instead of sending signals.
    #[derive(Debug, Default)]
    struct CountingPlatform {
        kills: AtomicUsize,
    }

    impl PlatformAdapter for CountingPlatform {
        fn prepare_process(&self, _cmd: &mut Command) {}

        fn kill_process<'a>(&'a self, _pid: u32, _signal: &'a TimeoutSignal) -> KillFuture<'a> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn ctx() -> KillContext {
        KillContext {
            timeout: Duration::from_secs(10),
            ..KillContext::default()
        }
    }

    #[test]
    fn clean_exit_is_zero_without_error() {
        let out = normalize_exit(RawExit::Success, &ctx());
        assert_eq!(out.exit_code, 0);
        assert!(out.error.is_none());
    }

    #[test]
    fn clean_exit_after_losing_race_stays_zero() {
        let c = KillContext {
            canceled: true,
            timed_out: true,
            ..ctx()
        };
        let out = normalize_exit(RawExit::Success, &c);
        assert_eq!(out.exit_code, 0);
        assert!(out.error.is_none());
    }

    #[test]
    fn ordinary_failure_is_verbatim() {
        let out = normalize_exit(RawExit::Code(3), &ctx());
        assert_eq!(out.exit_code, 3);
        assert!(matches!(out.error, Some(ExecError::NonZeroExit { code: 3 })));
    }

    #[test]
    fn failure_code_wins_over_cancel_when_not_killed() {
        let c = KillContext {
            canceled: true,
            ..ctx()
        };
        let out = normalize_exit(RawExit::Code(2), &c);
        assert_eq!(out.exit_code, 2);
    }

    #[test]
    fn signal_with_cancel_is_preemptive_stop() {
        let c = KillContext {
            canceled: true,
            timed_out: true,
            ..ctx()
        };
        let out = normalize_exit(RawExit::Signaled, &c);
        assert_eq!(out.exit_code, STOPPED_PREEMPTIVELY_EXIT_CODE);
        assert!(matches!(out.error, Some(ExecError::Canceled)));
    }

    #[test]
    fn signal_with_timeout_is_preemptive_stop() {
        let c = KillContext {
            timed_out: true,
            ..ctx()
        };
        let out = normalize_exit(RawExit::Signaled, &c);
        assert_eq!(out.exit_code, STOPPED_PREEMPTIVELY_EXIT_CODE);
        assert!(matches!(out.error, Some(ExecError::TimedOut { .. })));
    }

    #[test]
    fn interrupted_flag_overrides_raw_code() {
        let c = KillContext {
            interrupted: true,
            timed_out: true,
            ..ctx()
        };
        let out = normalize_exit(RawExit::Code(1), &c);
        assert_eq!(out.exit_code, STOPPED_PREEMPTIVELY_EXIT_CODE);
    }

    #[test]
    fn unattributed_kill_surfaces_minus_one() {
        let out = normalize_exit(RawExit::Signaled, &ctx());
        assert_eq!(out.exit_code, UNATTRIBUTED_KILL_EXIT_CODE);
        assert!(matches!(out.error, Some(ExecError::Killed)));
    }

    #[tokio::test]
    async fn deadline_tied_with_exit_sends_no_kill() {
        let platform = Arc::new(CountingPlatform::default());
        let (done_tx, done_rx) = watch::channel(());
        drop(done_tx);

        let fired = kill_on_timeout(
            4242,
            Duration::ZERO,
            platform.clone(),
            Arc::new(TimeoutSignal::new()),
            done_rx,
        )
        .await;

        assert!(fired, "a passed deadline is still reported");
        assert_eq!(platform.kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_after_reap_sends_no_kill() {
        let platform = Arc::new(CountingPlatform::default());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let (done_tx, done_rx) = watch::channel(());
        drop(done_tx);

        kill_on_cancel(
            4242,
            cancel,
            platform.clone(),
            Arc::new(TimeoutSignal::new()),
            done_rx,
        )
        .await;

        assert_eq!(platform.kills.load(Ordering::SeqCst), 0);
    }
}
