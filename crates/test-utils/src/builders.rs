#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use cmdexec::exec::CommandSpec;

/// Builder for `CommandSpec` to simplify test setup.
pub struct SpecBuilder {
    spec: CommandSpec,
}

impl SpecBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            spec: CommandSpec::new(command, Vec::<String>::new(), Duration::from_secs(10)),
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: &str) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.spec.args.push(arg.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.spec.timeout = Duration::from_secs(secs);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> CommandSpec {
        self.spec
    }
}
