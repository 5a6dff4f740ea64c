//! CLI probe scenarios

mod common;

use std::time::Duration;

use common::cli_harness;
use lsfr_attest::{contains, is, Config};

#[tokio::test]
async fn test_exec_basic_ok() {
    let (_dir, harness) = cli_harness(Config { command: "echo".into(), ..Config::default() });

    harness
        .exec(["Hello World"])
        .exit_code(is(0))
        .output(is("Hello World\n"))
        .assert("Echo command should return the expected output")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exit_code_mismatch_rendering() {
    let (_dir, harness) = cli_harness(Config { command: "sh".into(), ..Config::default() });

    let err = harness
        .exec(["-c", "false"])
        .exit_code(is(0))
        .assert("Should fail when expecting exit code 0 but the command returns 1")
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("sh -c false"), "signature missing: {message}");
    assert!(message.contains("Expected 0, got 1"), "contrast missing: {message}");
}

#[tokio::test]
async fn test_output_mismatch_rendering() {
    let (_dir, harness) = cli_harness(Config { command: "sh".into(), ..Config::default() });

    let err = harness
        .exec(["-c", "echo Wrong Output"])
        .exit_code(is(0))
        .output(is("Expected Output"))
        .assert("Should fail when the command output doesn't match")
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Expected output \"Expected Output\""), "{message}");
    assert!(message.contains("Actual output: \"Wrong Output\\n\""), "{message}");
}

#[tokio::test]
async fn test_execute_timeout_yields_sentinel() {
    let (_dir, harness) = cli_harness(Config {
        command: "sleep".into(),
        execute_timeout: Duration::from_millis(50),
        ..Config::default()
    });

    harness
        .exec(["20"])
        .exit_code(is(-1))
        .output(contains("timed out after"))
        .assert("A timed-out command reports the sentinel exit code")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancellation_yields_sentinel() {
    let (_dir, harness) = cli_harness(Config { command: "echo".into(), ..Config::default() });

    harness.cancel();

    harness
        .exec(["never runs"])
        .exit_code(is(-1))
        .output(contains("was cancelled"))
        .assert("A cancelled command reports the sentinel exit code")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exec_eventually_succeeds_once_file_exists() {
    let (dir, harness) = cli_harness(Config { command: "sh".into(), ..Config::default() });

    let marker = dir.path().join("ready");
    let marker_for_task = marker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = std::fs::write(marker_for_task, "");
    });

    let script = format!(
        "test -f '{}' && echo Ready || (echo 'Not Ready' >&2; exit 1)",
        marker.display()
    );
    harness
        .exec(["-c", &script])
        .eventually()
        .within(Duration::from_secs(3))
        .exit_code(is(0))
        .output(is("Ready\n"))
        .assert("Command should eventually succeed once the file exists")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exec_consistently_stable_output() {
    let (_dir, harness) = cli_harness(Config { command: "echo".into(), ..Config::default() });

    harness
        .exec(["Stable"])
        .consistently()
        .for_duration(Duration::from_millis(400))
        .exit_code(is(0))
        .output(is("Stable\n"))
        .assert("Command should consistently produce stable output")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exec_consistently_refuted_by_changing_output() {
    let (_dir, harness) = cli_harness(Config { command: "sh".into(), ..Config::default() });

    let result = harness
        .exec(["-c", "date +%N"])
        .consistently()
        .for_duration(Duration::from_millis(500))
        .output(is("12345\n"))
        .assert("Should fail when the command output changes between executions")
        .await;

    assert!(result.is_err());
}
