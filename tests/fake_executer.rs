// tests/fake_executer.rs

use cmdexec_test_utils::builders::SpecBuilder;
use cmdexec_test_utils::fake_executer::{FakeExecuter, FakeResponse};
use cmdexec_test_utils::{init_tracing, read_to_string, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cmdexec::exec::{
    CancelFlag, CommandExecuter, CommandSpec, OutputPaths, STOPPED_PREEMPTIVELY_EXIT_CODE,
};

type TestResult = Result<(), Box<dyn Error>>;

/// Minimal caller that only knows the trait, the way a plugin would.
async fn run_all(
    executer: &dyn CommandExecuter,
    specs: &[CommandSpec],
    cancel: &CancelFlag,
) -> Vec<i32> {
    let mut codes = Vec::new();
    for spec in specs {
        let result = executer.execute(spec, &OutputPaths::in_memory(), cancel).await;
        codes.push(result.exit_code);
    }
    codes
}

#[tokio::test]
async fn callers_can_drive_a_fake_executer() -> TestResult {
    init_tracing();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeExecuter::new(
        FakeResponse {
            exit_code: 0,
            stdout: b"ok".to_vec(),
            ..FakeResponse::default()
        },
        executed.clone(),
    );

    let specs = vec![
        SpecBuilder::new("first").build(),
        SpecBuilder::new("second").arg("--flag").build(),
    ];
    let cancel = CancelFlag::new();
    let codes = with_timeout(run_all(&fake, &specs, &cancel)).await;

    assert_eq!(codes, vec![0, 0]);
    {
        let guard = executed.lock().unwrap();
        assert_eq!(guard.len(), 2);
        assert_eq!(guard[1].to_string(), "second --flag");
    }

    let result = fake
        .execute(&specs[0], &OutputPaths::in_memory(), &cancel)
        .await;
    assert_eq!(read_to_string(result.stdout), "ok");
    Ok(())
}

#[tokio::test]
async fn fake_honours_cancellation() -> TestResult {
    init_tracing();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeExecuter::new(
        FakeResponse {
            wait_for_cancel: true,
            ..FakeResponse::default()
        },
        executed,
    );
    let spec = SpecBuilder::new("long-running").build();
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
    }

    let result = with_timeout(fake.execute(&spec, &OutputPaths::in_memory(), &cancel)).await;
    assert_eq!(result.exit_code, STOPPED_PREEMPTIVELY_EXIT_CODE);
    assert_eq!(result.errors.len(), 1);
    Ok(())
}
