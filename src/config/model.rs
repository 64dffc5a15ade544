// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::OutputPaths;
use crate::identity::StaticIdentity;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [executor]
/// timeout_secs = 3600
/// working_dir = "/var/lib/agent"
///
/// [output]
/// stdout = "stdout.log"
/// stderr = "stderr.log"
///
/// [identity]
/// instance_id = "i-0123456789abcdef0"
/// region = "eu-west-1"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub identity: IdentitySection,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    /// Execution timeout in seconds; must be at least 1.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Working directory for commands. Defaults to the agent's cwd.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    3600
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            working_dir: None,
        }
    }
}

/// `[output]` section. Unset paths mean in-memory capture.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub stdout: Option<PathBuf>,
    #[serde(default)]
    pub stderr: Option<PathBuf>,
}

/// `[identity]` section feeding the environment of launched commands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitySection {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Validated configuration. Build it through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub executor: ExecutorSection,
    pub output: OutputSection,
    pub identity: IdentitySection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        executor: ExecutorSection,
        output: OutputSection,
        identity: IdentitySection,
    ) -> Self {
        Self {
            executor,
            output,
            identity,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.executor.timeout_secs)
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths {
            stdout: self.output.stdout.clone(),
            stderr: self.output.stderr.clone(),
        }
    }

    pub fn identity_provider(&self) -> StaticIdentity {
        StaticIdentity::new(
            self.identity.instance_id.clone(),
            self.identity.region.clone(),
        )
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.executor, raw.output, raw.identity)
    }
}
