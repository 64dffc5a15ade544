// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{CmdexecError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::CmdexecError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.executor, raw.output, raw.identity))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_executor(cfg)?;
    validate_output(cfg)?;
    validate_identity(cfg)?;
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.timeout_secs == 0 {
        return Err(CmdexecError::ConfigError(
            "[executor].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_output(cfg: &RawConfigFile) -> Result<()> {
    for (name, path) in [("stdout", &cfg.output.stdout), ("stderr", &cfg.output.stderr)] {
        if let Some(path) = path {
            if path.as_os_str().is_empty() {
                return Err(CmdexecError::ConfigError(format!(
                    "[output].{name} must not be an empty path"
                )));
            }
        }
    }
    Ok(())
}

fn validate_identity(cfg: &RawConfigFile) -> Result<()> {
    for (name, value) in [
        ("instance_id", &cfg.identity.instance_id),
        ("region", &cfg.identity.region),
    ] {
        if let Some(value) = value {
            if value.trim().is_empty() || value.contains('\0') {
                return Err(CmdexecError::ConfigError(format!(
                    "[identity].{name} must be a non-empty value without NUL bytes"
                )));
            }
        }
    }
    Ok(())
}
