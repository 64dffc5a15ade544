// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod identity;
pub mod logging;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::exec::{
    CancelFlag, CommandExecuter, CommandSpec, ExecutionResult, OutputPaths, ProcessExecuter,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the process executer with the configured identity
/// - Ctrl-C → cancellation
///
/// Returns the normalized exit code of the command.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_or_default(args.config.as_deref())?;
    let (spec, outputs) = resolve(&args, &cfg)?;

    if args.dry_run {
        print_dry_run(&spec, &outputs);
        return Ok(0);
    }

    let executer = ProcessExecuter::new(Arc::new(cfg.identity_provider()));
    let cancel = CancelFlag::new();

    // Ctrl-C → cancel the running command.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; cancelling command");
            cancel.cancel();
        });
    }

    if args.detach {
        return run_detached(&executer, &spec, &outputs, &cancel).await;
    }

    let result = executer.execute(&spec, &outputs, &cancel).await;
    report(result)
}

/// Merge config values and CLI flags into what to run.
fn resolve(args: &CliArgs, cfg: &ConfigFile) -> Result<(CommandSpec, OutputPaths)> {
    let (command, rest) = args
        .command
        .split_first()
        .context("no command given")?;

    let timeout = args
        .timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| cfg.timeout());

    let mut spec = CommandSpec::new(command.clone(), rest.iter().cloned(), timeout);
    if let Some(dir) = args.cwd.clone().or_else(|| cfg.executor.working_dir.clone()) {
        spec = spec.with_working_dir(dir);
    }

    let mut outputs = cfg.output_paths();
    if args.stdout.is_some() {
        outputs.stdout = args.stdout.clone();
    }
    if args.stderr.is_some() {
        outputs.stderr = args.stderr.clone();
    }

    Ok((spec, outputs))
}

/// Copy captured output to our own stdout/stderr and log advisory errors.
fn report(mut result: ExecutionResult) -> Result<i32> {
    io::copy(&mut result.stdout, &mut io::stdout().lock()).context("writing command stdout")?;
    io::copy(&mut result.stderr, &mut io::stderr().lock()).context("writing command stderr")?;

    for err in &result.errors {
        warn!(error = %err, "command reported an error");
    }
    info!(exit_code = result.exit_code, "command finished");
    Ok(result.exit_code)
}

async fn run_detached(
    executer: &ProcessExecuter,
    spec: &CommandSpec,
    outputs: &OutputPaths,
    cancel: &CancelFlag,
) -> Result<i32> {
    let started = executer.start_exe(spec, outputs, cancel).await;
    for err in &started.errors {
        warn!(error = %err, "failed to start command");
    }

    let Some(mut process) = started.process else {
        return Ok(started.exit_code);
    };

    if let Some(pid) = process.id() {
        println!("{pid}");
    }

    let outcome = process.wait().await;
    if let Some(err) = &outcome.error {
        warn!(error = %err, "command reported an error");
    }
    info!(exit_code = outcome.exit_code, "detached command finished");
    Ok(outcome.exit_code)
}

fn print_dry_run(spec: &CommandSpec, outputs: &OutputPaths) {
    println!("cmdexec dry-run");
    println!("  command: {spec}");
    println!("  timeout: {:?}", spec.timeout);
    if let Some(dir) = &spec.working_dir {
        println!("  working_dir: {}", dir.display());
    }
    match &outputs.stdout {
        Some(path) => println!("  stdout: {}", path.display()),
        None => println!("  stdout: <memory>"),
    }
    match &outputs.stderr {
        Some(path) => println!("  stderr: {}", path.display()),
        None => println!("  stderr: <memory>"),
    }
}
