//! Suite runner ordering, isolation, and teardown behaviour

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lsfr_attest::{Config, Error, Harness, Suite};
use tokio_util::sync::CancellationToken;

fn scratch_config() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config { working_dir: dir.path().to_path_buf(), ..Config::default() };
    (dir, config)
}

#[tokio::test]
async fn test_all_passing_suite_returns_true() {
    let (_dir, config) = scratch_config();

    let passed = Suite::new()
        .with_config(config)
        .test("first", |_h| async move { Ok(()) })
        .test("second", |_h| async move { Ok(()) })
        .run(CancellationToken::new())
        .await;

    assert!(passed);
}

#[tokio::test]
async fn test_stops_at_first_failure() {
    let (_dir, config) = scratch_config();
    let executed = Arc::new(AtomicUsize::new(0));

    let first = executed.clone();
    let second = executed.clone();
    let third = executed.clone();

    let passed = Suite::new()
        .with_config(config)
        .test("passes", move |_h| {
            let counter = first.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .test("fails", move |_h| {
            let counter = second.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::Mismatch("expected something else".to_string()))
            }
        })
        .test("never runs", move |_h| {
            let counter = third.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .run(CancellationToken::new())
        .await;

    assert!(!passed);
    assert_eq!(executed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_setup_failure_skips_all_tests() {
    let (_dir, config) = scratch_config();
    let executed = Arc::new(AtomicUsize::new(0));

    let counter = executed.clone();
    let passed = Suite::new()
        .with_config(config)
        .setup(|_h| async move { Err(Error::Setup("run.sh is missing".to_string())) })
        .test("never runs", move |_h| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .run(CancellationToken::new())
        .await;

    assert!(!passed);
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_setup_skips_all_tests() {
    let (_dir, config) = scratch_config();
    let executed = Arc::new(AtomicUsize::new(0));

    let counter = executed.clone();
    let passed = Suite::new()
        .with_config(config)
        .setup(|_h| async move {
            if true {
                panic!("setup exploded");
            }
            Ok(())
        })
        .test("never runs", move |_h| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .run(CancellationToken::new())
        .await;

    assert!(!passed);
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_panicking_test_is_isolated_and_stops_suite() {
    let (_dir, config) = scratch_config();
    let executed = Arc::new(AtomicUsize::new(0));

    let counter = executed.clone();
    let passed = Suite::new()
        .with_config(config)
        .test("panics", |_h| async move {
            if true {
                panic!("test body exploded");
            }
            Ok(())
        })
        .test("never runs", move |_h| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .run(CancellationToken::new())
        .await;

    assert!(!passed);
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_between_tests_halts_the_suite() {
    let (_dir, config) = scratch_config();
    let executed = Arc::new(AtomicUsize::new(0));

    let counter = executed.clone();
    let passed = Suite::new()
        .with_config(config)
        .test("cancels the scope", |h| async move {
            h.cancel();
            Ok(())
        })
        .test("never runs", move |_h| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .run(CancellationToken::new())
        .await;

    assert!(!passed);
    assert_eq!(executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_external_cancellation_before_run() {
    let (_dir, config) = scratch_config();

    let token = CancellationToken::new();
    token.cancel();

    let passed = Suite::new()
        .with_config(config)
        .test("never runs", |_h| async move { Ok(()) })
        .run(token)
        .await;

    assert!(!passed);
}

#[tokio::test]
async fn test_concurrently_runs_all_and_reports_first_failure() {
    let (_dir, config) = scratch_config();
    let harness = Harness::new(config, CancellationToken::new()).unwrap();

    let executed = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let counter = executed.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if i == 1 {
                    Err(Error::Mismatch(format!("worker {i} failed")))
                } else {
                    Ok(())
                }
            }
        })
        .collect();

    let err = harness.concurrently(tasks).await.unwrap_err();

    // Every worker settled before the failure surfaced.
    assert_eq!(executed.load(Ordering::SeqCst), 4);
    assert!(err.to_string().contains("worker 1 failed"));
}

#[tokio::test]
async fn test_concurrently_captures_panics() {
    let (_dir, config) = scratch_config();
    let harness = Harness::new(config, CancellationToken::new()).unwrap();

    let executed = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..3)
        .map(|i| {
            let counter = executed.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if i == 0 {
                    panic!("worker exploded");
                }
                Ok(())
            }
        })
        .collect();

    let err = harness.concurrently(tasks).await.unwrap_err();

    assert_eq!(executed.load(Ordering::SeqCst), 3);
    assert!(matches!(err, Error::Panicked(_)), "expected panic capture, got: {err}");
}
