//! Integration tests for the execution engine's retry and health behaviour.

use std::sync::Arc;

use budgie::models::invocation::FailureKind;
use budgie::models::session::Workspace;
use budgie::orchestrator::health::HealthMonitor;
use tokio_util::sync::CancellationToken;

use budgie::orchestrator::executor::Executor;
use budgie::orchestrator::runner::ProcessRunner;

use super::test_helpers::{
    executor, executor_config, local_request, sandbox, ScriptedRunner, Step,
};

fn verbose_executor(runner: &Arc<ScriptedRunner>) -> Executor {
    let mut config = executor_config(None);
    config.verbose = true;
    Executor::new(
        config,
        Arc::clone(runner) as Arc<dyn ProcessRunner>,
        Arc::new(HealthMonitor::new()),
    )
}

#[tokio::test]
async fn success_runs_once_and_records_success() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::ok("  done\n")]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert!(result.is_success());
    assert_eq!(result.output, "done");
    assert!(!result.retried);
    assert_eq!(runner.call_count(), 1);

    let health = monitor.snapshot("reviewer");
    assert_eq!(health.total_calls, 1);
    assert_eq!(health.success_calls, 1);
}

#[tokio::test]
async fn deadline_exceeded_is_retried_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![
        Step::exit(1, "context deadline exceeded"),
        Step::exit(1, "context deadline exceeded"),
        Step::ok("never reached"),
    ]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(runner.call_count(), 2);
    assert!(result.retried);
    let failure = result.error.unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);

    let health = monitor.snapshot("reviewer");
    assert_eq!(health.total_calls, 1, "health is recorded once per invocation");
    assert_eq!(health.failed_calls, 1);
    assert_eq!(health.timeout_calls, 1);
}

#[tokio::test]
async fn retry_can_recover() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::timed_out(), Step::ok("second try")]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert!(result.is_success());
    assert!(result.retried);
    assert_eq!(result.output, "second try");
    assert_eq!(runner.call_count(), 2);

    let health = monitor.snapshot("reviewer");
    assert_eq!(health.total_calls, 1);
    assert_eq!(health.success_calls, 1);
    assert_eq!(health.timeout_calls, 0);
}

#[tokio::test]
async fn required_exit_status_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![
        Step::exit(2, "exit status 2: argument --agent is required"),
        Step::ok("never reached"),
    ]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(runner.call_count(), 1);
    assert!(!result.retried);
    assert_eq!(result.error.unwrap().kind, FailureKind::NonRetryableExit);
    assert_eq!(monitor.snapshot("reviewer").timeout_calls, 0);
}

#[tokio::test]
async fn bare_exit_status_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::exit(1, ""), Step::exit(1, "")]);
    let executor = executor(Arc::clone(&runner), Arc::new(HealthMonitor::new()), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(runner.call_count(), 2);
    let failure = result.error.unwrap();
    assert_eq!(failure.kind, FailureKind::Exit);
    assert_eq!(failure.to_string(), "kiro-cli failed: exit status 1");
}

#[tokio::test]
async fn cancelled_invocation_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::ok("unused")]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = executor.execute(&local_request(dir.path()), &cancel).await;

    assert_eq!(runner.call_count(), 1);
    assert!(!result.retried);
    assert_eq!(result.error.unwrap().kind, FailureKind::Cancelled);

    let health = monitor.snapshot("reviewer");
    assert_eq!(health.failed_calls, 1);
    assert_eq!(health.timeout_calls, 0);
}

#[tokio::test]
async fn local_workspace_runs_binary_directly() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![]);
    let executor = executor(Arc::clone(&runner), Arc::new(HealthMonitor::new()), None);

    let mut request = local_request(dir.path());
    request.resume = true;
    executor.execute(&request, &CancellationToken::new()).await;

    let spec = &runner.calls()[0];
    assert_eq!(spec.program, "kiro-cli");
    assert_eq!(spec.current_dir.as_deref(), Some(dir.path()));
    assert!(spec.has_arg("--resume"));
    assert!(spec.has_arg("claude-sonnet-4.5"));
    assert!(!spec.has_arg("docker"));
}

#[tokio::test]
async fn volume_workspace_runs_in_container() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![]);
    let executor = executor(
        Arc::clone(&runner),
        Arc::new(HealthMonitor::new()),
        Some(sandbox()),
    );

    let mut request = local_request(dir.path());
    request.workspace = Workspace::NamedVolume("s-1".into());
    executor.execute(&request, &CancellationToken::new()).await;

    let spec = &runner.calls()[0];
    assert_eq!(spec.program, "docker");
    assert!(spec.has_arg("budgie-session-s-1:/root/.local/share/kiro-cli:rw"));
    assert!(spec.has_arg("/src:/workspace:rw"));
}

#[tokio::test]
async fn volume_workspace_without_sandbox_fails_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![]);
    let executor = executor(Arc::clone(&runner), Arc::new(HealthMonitor::new()), None);

    let mut request = local_request(dir.path());
    request.workspace = Workspace::NamedVolume("s-1".into());
    let result = executor.execute(&request, &CancellationToken::new()).await;

    assert_eq!(runner.call_count(), 0);
    assert_eq!(result.error.unwrap().kind, FailureKind::Other);
}

#[tokio::test]
async fn verbose_mode_appends_transcript_per_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::timed_out(), Step::ok("answer")]);
    let executor = verbose_executor(&runner);

    let request = local_request(dir.path());
    executor.execute(&request, &CancellationToken::new()).await;

    let transcript =
        std::fs::read_to_string(dir.path().join(request.response_file.transcript_name())).unwrap();
    assert_eq!(transcript.matches("=== Chat Debug:").count(), 2);
    assert!(transcript.contains("Agent: reviewer"));
    assert!(transcript.contains("=== ERROR ===\nagent timeout after"));
    assert!(transcript.contains("=== STDOUT ===\nanswer"));
}

#[tokio::test]
async fn verbose_transcript_is_complete_when_execute_returns() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![Step::ok("answer")]);
    let executor = verbose_executor(&runner);

    let request = local_request(dir.path());
    let result = executor.execute(&request, &CancellationToken::new()).await;
    assert!(result.is_success());

    let transcript =
        std::fs::read_to_string(dir.path().join(request.response_file.transcript_name())).unwrap();
    assert!(transcript.starts_with("=== Chat Debug: "));
    assert!(transcript.ends_with("=== STDOUT ===\nanswer\n=== STDERR ===\n"));
}

#[tokio::test]
async fn verbose_transcript_keeps_output_of_timed_out_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![
        Step::timed_out_after("reading files", "upstream slow"),
        Step::ok("answer"),
    ]);
    let executor = verbose_executor(&runner);

    let request = local_request(dir.path());
    executor.execute(&request, &CancellationToken::new()).await;

    let transcript =
        std::fs::read_to_string(dir.path().join(request.response_file.transcript_name())).unwrap();
    assert!(transcript.contains("=== STDOUT ===\nreading files\n=== STDERR ===\nupstream slow"));
    assert!(transcript.contains("=== ERROR ===\nagent timeout after"));
}

#[tokio::test]
async fn signal_kill_reporting_timeout_counts_as_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new(vec![
        Step::signaled(9, "upstream request timeout"),
        Step::signaled(9, "upstream request timeout"),
    ]);
    let monitor = Arc::new(HealthMonitor::new());
    let executor = executor(Arc::clone(&runner), Arc::clone(&monitor), None);

    let result = executor
        .execute(&local_request(dir.path()), &CancellationToken::new())
        .await;

    assert_eq!(runner.call_count(), 2);
    assert!(result.retried);
    assert_eq!(result.error.unwrap().kind, FailureKind::Killed);

    let health = monitor.snapshot("reviewer");
    assert_eq!(health.total_calls, 1);
    assert_eq!(health.failed_calls, 1);
    assert_eq!(health.timeout_calls, 1);
}
