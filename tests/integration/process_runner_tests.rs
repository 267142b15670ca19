//! Integration tests for the tokio-backed process runner using real `sh`
//! processes.

#![cfg(unix)]

use std::time::{Duration, Instant};

use budgie::orchestrator::command::CommandSpec;
use budgie::orchestrator::runner::{
    Captured, ProcessRunner, RunOutcome, Termination, TokioRunner,
};
use tokio_util::sync::CancellationToken;

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

#[tokio::test]
async fn captures_stdout_and_stderr() {
    let outcome = TokioRunner
        .run(
            &sh("echo out; echo err >&2"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

    let RunOutcome::Finished(output) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(output.success());
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
}

#[tokio::test]
async fn reports_exit_code() {
    let outcome = TokioRunner
        .run(&sh("exit 7"), Duration::from_secs(5), &CancellationToken::new())
        .await;

    let RunOutcome::Finished(output) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(output.termination, Termination::Exited(7));
    assert!(!output.success());
}

#[tokio::test]
async fn deadline_kills_slow_process() {
    let started = Instant::now();
    let outcome = TokioRunner
        .run(
            &sh("sleep 10"),
            Duration::from_millis(200),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome, RunOutcome::TimedOut(Captured::default()));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn deadline_keeps_output_written_before_kill() {
    let started = Instant::now();
    let outcome = TokioRunner
        .run(
            &sh("echo started; echo warming >&2; sleep 10"),
            Duration::from_millis(500),
            &CancellationToken::new(),
        )
        .await;

    let RunOutcome::TimedOut(partial) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(partial.stdout, "started\n");
    assert_eq!(partial.stderr, "warming\n");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_stops_process() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = TokioRunner
        .run(&sh("sleep 10"), Duration::from_secs(30), &cancel)
        .await;

    assert_eq!(outcome, RunOutcome::Cancelled(Captured::default()));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn missing_binary_is_spawn_failure() {
    let outcome = TokioRunner
        .run(
            &CommandSpec::new("budgie-definitely-not-installed"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(outcome, RunOutcome::SpawnFailed(_)));
}

#[tokio::test]
async fn stdin_payload_reaches_child() {
    let mut spec = sh("cat");
    spec.stdin = Some("piped content".into());

    let outcome = TokioRunner
        .run(&spec, Duration::from_secs(5), &CancellationToken::new())
        .await;

    let RunOutcome::Finished(output) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(output.stdout, "piped content");
}

#[tokio::test]
async fn runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = sh("pwd");
    spec.current_dir = Some(dir.path().to_path_buf());

    let outcome = TokioRunner
        .run(&spec, Duration::from_secs(5), &CancellationToken::new())
        .await;

    let RunOutcome::Finished(output) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    let reported = std::path::PathBuf::from(output.stdout.trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn signal_termination_is_reported() {
    let outcome = TokioRunner
        .run(&sh("kill -9 $$"), Duration::from_secs(5), &CancellationToken::new())
        .await;

    let RunOutcome::Finished(output) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(output.termination, Termination::Signaled(Some(9)));
}
