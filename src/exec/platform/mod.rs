// src/exec/platform/mod.rs

//! OS-specific process configuration and termination.
//!
//! The executor talks to a [`PlatformAdapter`] instead of calling OS APIs
//! directly, so the process-group setup, the environment policy and the kill
//! strategy can be swapped per platform (or faked in tests) without touching
//! the race logic in [`super::process`].
//!
//! - [`NativePlatform`] is the adapter for the current OS family, implemented
//!   in `unix.rs` and `windows.rs`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Command;
use tracing::debug;

use crate::exec::CommandSpec;
use crate::identity::IdentityProvider;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Environment variable carrying the agent's instance id.
pub const ENV_VAR_INSTANCE_ID: &str = "AWS_SSM_INSTANCE_ID";
/// Environment variable carrying the agent's region.
pub const ENV_VAR_REGION_NAME: &str = "AWS_SSM_REGION_NAME";

/// Per-execution record shared by the kill paths.
///
/// `interrupted` is set by adapters whose forced kill leaves an exit status
/// that looks like an ordinary failure. Setting it twice is harmless.
#[derive(Debug, Default)]
pub struct TimeoutSignal {
    interrupted: AtomicBool,
}

impl TimeoutSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

pub type KillFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

/// Platform hooks used by the executor around a child process.
pub trait PlatformAdapter: Send + Sync + Debug {
    /// Configure the command so that a later kill reaches the whole process
    /// tree. Only effective before spawn.
    fn prepare_process(&self, cmd: &mut Command);

    /// Forcefully terminate the process tree rooted at `pid`.
    ///
    /// Must succeed quietly when the process is already gone.
    fn kill_process<'a>(&'a self, pid: u32, signal: &'a TimeoutSignal) -> KillFuture<'a>;

    /// Platform-specific fixes applied after the agent variables are added.
    fn correct_environment(&self, _spec: &CommandSpec, _env: &mut BTreeMap<OsString, OsString>) {}

    /// Build the child's environment: the agent's own environment, the
    /// identity variables that could be resolved, then platform corrections.
    ///
    /// Inherited values are passed through as raw OS strings, whether or not
    /// they are valid UTF-8.
    fn prepare_environment(
        &self,
        spec: &CommandSpec,
        identity: &dyn IdentityProvider,
    ) -> BTreeMap<OsString, OsString> {
        let mut env: BTreeMap<OsString, OsString> = std::env::vars_os().collect();
        extend_with_identity(&mut env, identity);
        self.correct_environment(spec, &mut env);
        env
    }
}

/// Add the identity variables, skipping any lookup that fails.
pub fn extend_with_identity(
    env: &mut BTreeMap<OsString, OsString>,
    identity: &dyn IdentityProvider,
) {
    match identity.instance_id() {
        Ok(id) => {
            env.insert(ENV_VAR_INSTANCE_ID.into(), id.into());
        }
        Err(e) => debug!(error = %e, "instance id unavailable; not exporting it"),
    }
    match identity.region() {
        Ok(region) => {
            env.insert(ENV_VAR_REGION_NAME.into(), region.into());
        }
        Err(e) => debug!(error = %e, "region unavailable; not exporting it"),
    }
}

/// Adapter for the OS this binary was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;
