//! Integration tests for the retrying executor.

use google_workspace::errors::{ErrorKey, NetworkError, WorkspaceError};
use google_workspace::resilience::{Classifier, Pacer, RetryExecutor, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::standard()
        .with_max_retries(max_retries)
        .with_initial_backoff(Duration::from_millis(1))
        .with_max_backoff(Duration::from_millis(5))
        .with_jitter(false)
}

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn lines_containing(&self, needle: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

fn executor() -> RetryExecutor {
    RetryExecutor::new(fast_policy(4), Pacer::disabled())
}

#[tokio::test]
async fn test_quota_403_retried_then_succeeds() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let executor = executor();
    let key = ErrorKey::new(["user@example.com"]);
    let attempts = Arc::new(AtomicU32::new(0));

    let result = executor
        .run_value(&key, || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WorkspaceError::api(403, "User Rate Limit Exceeded"))
                } else {
                    Ok("V")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "V");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    let retries = logs.lines_containing("- Retrying...");
    assert_eq!(retries.len(), 1);
    assert!(retries[0]
        .contains("user@example.com: googleapi: Error 403: User Rate Limit Exceeded - Retrying..."));
}

#[tokio::test]
async fn test_not_found_is_terminal_and_keyed() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let executor = executor();
    let key = ErrorKey::new(["user@example.com", "full"]);
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = executor
        .run_value(&key, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WorkspaceError::api(404, "Not Found"))
            }
        })
        .await;

    let error = result.unwrap_err();
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(error.key(), Some("user@example.com - full"));
    assert!(error
        .to_string()
        .starts_with("user@example.com - full: "));
    assert_eq!(error.status_code().map(|s| s.as_u16()), Some(404));
    assert!(logs.lines_containing("Retrying").is_empty());
}

#[tokio::test]
async fn test_retryable_error_bounded_to_five_attempts() {
    let executor = executor();
    let key = ErrorKey::new(["group@example.com"]);
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = executor
        .run_value(&key, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WorkspaceError::api(403, "Quota exceeded for quota metric"))
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    let error = result.unwrap_err();
    assert!(error.to_string().starts_with("group@example.com: "));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_plain_403_and_network_errors_not_retried() {
    let executor = executor();
    let key = ErrorKey::new(["k"]);

    let failures: [fn() -> WorkspaceError; 3] = [
        || WorkspaceError::api(403, "Not Authorized to access this resource/api"),
        || WorkspaceError::Network(NetworkError::Timeout("deadline".to_string())),
        || WorkspaceError::api(500, "Backend Error"),
    ];
    for failure in failures {
        let attempts = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = executor
            .run_value(&key, || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(failure())
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_forbidden_classifier_retries_every_403() {
    let executor = RetryExecutor::new(fast_policy(9), Pacer::disabled())
        .with_classifier(Classifier::Forbidden);
    let key = ErrorKey::new(["file"]);
    let attempts = Arc::new(AtomicU32::new(0));

    let result = executor
        .run_action(&key, || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(WorkspaceError::api(403, "The user does not have sufficient permissions"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[test]
fn test_backoff_capped() {
    let policy = RetryPolicy::migration().with_jitter(false);
    assert_eq!(policy.backoff(1), Duration::from_millis(250));
    assert_eq!(policy.backoff(2), Duration::from_millis(500));
    assert_eq!(policy.backoff(9), Duration::from_secs(60));
}
