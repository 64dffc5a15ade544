// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use cmdexec::config::{load_and_validate, load_or_default};
use cmdexec::errors::CmdexecError;
use cmdexec::identity::IdentityProvider;

#[test]
fn full_config_is_loaded() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[executor]
timeout_secs = 42
working_dir = "/tmp"

[output]
stdout = "out.log"

[identity]
instance_id = "i-0abc"
region = "ap-south-1"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.timeout(), Duration::from_secs(42));
    assert_eq!(cfg.executor.working_dir.as_deref(), Some(std::path::Path::new("/tmp")));

    let identity = cfg.identity_provider();
    assert_eq!(identity.instance_id().unwrap(), "i-0abc");
    assert_eq!(identity.region().unwrap(), "ap-south-1");
}

#[test]
fn zero_timeout_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[executor]\ntimeout_secs = 0\n").unwrap();

    match load_and_validate(file.path()) {
        Err(CmdexecError::ConfigError(msg)) => assert!(msg.contains("timeout_secs")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn malformed_toml_returns_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[executor\ntimeout_secs = 1\n").unwrap();

    assert!(matches!(
        load_and_validate(file.path()),
        Err(CmdexecError::TomlError(_))
    ));
}

#[test]
fn missing_file_error_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    match load_and_validate(&path) {
        Err(err @ CmdexecError::ConfigRead { .. }) => {
            assert!(err.to_string().contains("absent.toml"), "message: {err}");
            if let CmdexecError::ConfigRead { path: p, source } = err {
                assert_eq!(p, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
        }
        Err(e) => panic!("Expected ConfigRead, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn no_config_path_uses_defaults() {
    let cfg = load_or_default(None).unwrap();
    assert_eq!(cfg.timeout(), Duration::from_secs(3600));
    assert!(cfg.identity_provider().instance_id().is_err());
}
