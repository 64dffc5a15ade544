pub mod builders;
pub mod fake_executer;
pub mod identity;

use std::io::Read;
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 15-second timeout.
///
/// Long enough for the slowest scenario (a 1s command timeout plus process
/// teardown), short enough that a leaked wait fails the test.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(15), f)
        .await
        .expect("Test timed out after 15 seconds")
}

/// Read a whole output reader into a `String`.
pub fn read_to_string(mut reader: cmdexec::exec::OutputReader) -> String {
    let mut out = String::new();
    reader
        .read_to_string(&mut out)
        .expect("output reader should be readable");
    out
}
