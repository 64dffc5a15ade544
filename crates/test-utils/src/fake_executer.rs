use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cmdexec::exec::executer::{ExecuteFuture, StartFuture};
use cmdexec::exec::{
    CancelFlag, CommandExecuter, CommandSpec, ExecutionResult, OutputPaths, StartResult,
    STOPPED_PREEMPTIVELY_EXIT_CODE,
};
use cmdexec::errors::ExecError;

/// Scripted response of a [`FakeExecuter`].
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Park until the cancel flag is set, then report a preemptive stop.
    pub wait_for_cancel: bool,
}

/// A fake executer that:
/// - records which commands were "run"
/// - answers every call with the same scripted response.
pub struct FakeExecuter {
    response: FakeResponse,
    executed: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeExecuter {
    pub fn new(response: FakeResponse, executed: Arc<Mutex<Vec<CommandSpec>>>) -> Self {
        Self { response, executed }
    }

    fn record(&self, spec: &CommandSpec) {
        let mut guard = self.executed.lock().unwrap();
        guard.push(spec.clone());
    }
}

impl CommandExecuter for FakeExecuter {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        _outputs: &'a OutputPaths,
        cancel: &'a CancelFlag,
    ) -> ExecuteFuture<'a> {
        Box::pin(async move {
            self.record(spec);

            let mut exit_code = self.response.exit_code;
            let mut errors = Vec::new();
            if self.response.wait_for_cancel {
                cancel.wait().await;
                if cancel.is_canceled() {
                    exit_code = STOPPED_PREEMPTIVELY_EXIT_CODE;
                    errors.push(ExecError::Canceled);
                }
            } else if exit_code != 0 {
                errors.push(ExecError::NonZeroExit { code: exit_code });
            }

            ExecutionResult {
                stdout: Box::new(Cursor::new(self.response.stdout.clone())),
                stderr: Box::new(Cursor::new(self.response.stderr.clone())),
                exit_code,
                errors,
            }
        })
    }

    /// Records the call; a fake has no live process to hand back.
    fn start_exe<'a>(
        &'a self,
        spec: &'a CommandSpec,
        _outputs: &'a OutputPaths,
        _cancel: &'a CancelFlag,
    ) -> StartFuture<'a> {
        Box::pin(async move {
            self.record(spec);
            StartResult {
                process: None,
                exit_code: 0,
                errors: Vec::new(),
            }
        })
    }
}
