// src/exec/platform/windows.rs

use std::io;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{KillFuture, NativePlatform, PlatformAdapter, TimeoutSignal};

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
/// `taskkill` exit status when the pid no longer exists.
const TASKKILL_NOT_FOUND: i32 = 128;

impl PlatformAdapter for NativePlatform {
    fn prepare_process(&self, cmd: &mut Command) {
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    fn kill_process<'a>(&'a self, pid: u32, signal: &'a TimeoutSignal) -> KillFuture<'a> {
        Box::pin(async move {
            if pid == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "pid must be non-zero",
                ));
            }

            // A terminated process reports exit status 1, which cannot be told
            // apart from a real failure.
            signal.mark_interrupted();

            let status = Command::new("taskkill")
                .args(["/t", "/f", "/pid", &pid.to_string()])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await?;

            match status.code() {
                Some(0) => {
                    debug!(pid, "process tree killed with taskkill");
                    Ok(())
                }
                Some(TASKKILL_NOT_FOUND) => {
                    debug!(pid, "process already gone");
                    Ok(())
                }
                other => Err(io::Error::other(format!(
                    "taskkill failed for pid {pid} (exit {other:?})"
                ))),
            }
        })
    }
}
