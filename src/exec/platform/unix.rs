// src/exec/platform/unix.rs

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::debug;

use super::{KillFuture, NativePlatform, PlatformAdapter, TimeoutSignal};
use crate::exec::CommandSpec;

impl PlatformAdapter for NativePlatform {
    fn prepare_process(&self, cmd: &mut Command) {
        // New process group with pgid == pid, so killpg reaches descendants.
        cmd.process_group(0);
    }

    fn kill_process<'a>(&'a self, pid: u32, _signal: &'a TimeoutSignal) -> KillFuture<'a> {
        Box::pin(async move {
            if pid == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "pid must be non-zero",
                ));
            }

            // SIGKILL shows up as a signal termination in the wait status, so
            // the interrupted flag is not needed here.
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) => {
                    debug!(pid, "sent SIGKILL to process group");
                    Ok(())
                }
                Err(Errno::ESRCH) => {
                    debug!(pid, "process group already gone");
                    Ok(())
                }
                Err(errno) => Err(io::Error::from(errno)),
            }
        })
    }

    fn correct_environment(&self, spec: &CommandSpec, env: &mut BTreeMap<OsString, OsString>) {
        if is_powershell(&spec.command) {
            // PowerShell on unix refuses to start without HOME and misbehaves
            // with a TERM it cannot drive.
            env.entry("HOME".into()).or_insert_with(|| "/".into());
            env.remove(OsStr::new("TERM"));
        }
    }
}

fn is_powershell(command: &str) -> bool {
    Path::new(command)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|name| {
            let name = name.to_lowercase();
            name.contains("pwsh") || name.contains("powershell")
        })
        .unwrap_or(false)
}
