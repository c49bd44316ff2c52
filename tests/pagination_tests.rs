//! Integration tests for the stream pager.

use google_workspace::errors::{ErrorKey, WorkspaceError};
use google_workspace::pagination::{paginate, Page};
use google_workspace::resilience::{Pacer, RetryExecutor, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn executor() -> Arc<RetryExecutor> {
    let policy = RetryPolicy::standard()
        .with_initial_backoff(Duration::from_millis(1))
        .with_max_backoff(Duration::from_millis(2))
        .with_jitter(false);
    Arc::new(RetryExecutor::new(policy, Pacer::disabled()))
}

fn three_pages(token: Option<String>) -> Page<&'static str> {
    match token.as_deref() {
        None => Page::new(vec!["A", "B"], Some("c1".to_string())),
        Some("c1") => Page::new(vec!["C"], Some("c2".to_string())),
        _ => Page::new(vec!["D", "E"], Some(String::new())),
    }
}

#[tokio::test]
async fn test_three_pages_in_order() {
    let stream = paginate(
        executor(),
        ErrorKey::new(["/Sales"]),
        2,
        CancellationToken::new(),
        |token| async move { Ok::<_, WorkspaceError>(three_pages(token)) },
    )
    .await;

    let items = stream.collect().await.unwrap();
    assert_eq!(items, vec!["A", "B", "C", "D", "E"]);
}

#[tokio::test]
async fn test_error_stops_listing() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let mut stream = paginate(
        executor(),
        ErrorKey::new(["group@example.com"]),
        10,
        CancellationToken::new(),
        move |token| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match token.as_deref() {
                    None => Ok(Page::new(vec![1, 2], Some("c1".to_string()))),
                    _ => Err(WorkspaceError::api(404, "Resource Not Found: groupKey")),
                }
            }
        },
    )
    .await;

    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    assert_eq!(items, vec![1, 2]);

    let error = stream.errors.recv().await.unwrap();
    assert_eq!(error.key(), Some("group@example.com"));
    assert!(stream.errors.recv().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_transient_page_failure_retried() {
    let failures = Arc::new(AtomicU32::new(0));
    let counter = failures.clone();

    let stream = paginate(
        executor(),
        ErrorKey::new(["k"]),
        10,
        CancellationToken::new(),
        move |token| {
            let counter = counter.clone();
            async move {
                if token.as_deref() == Some("c1") && counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(WorkspaceError::api(403, "Rate Limit Exceeded"));
                }
                Ok(three_pages(token))
            }
        },
    )
    .await;

    assert_eq!(stream.collect().await.unwrap().len(), 5);
    assert_eq!(failures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancellation_closes_channels() {
    let cancel = CancellationToken::new();
    let mut stream = paginate(
        executor(),
        ErrorKey::new(["endless"]),
        1,
        cancel.clone(),
        |token: Option<String>| async move {
            let next = token.map(|t| t.len() + 1).unwrap_or(1);
            Ok::<_, WorkspaceError>(Page::new(vec![next], Some("x".repeat(next))))
        },
    )
    .await;

    assert_eq!(stream.next().await, Some(1));
    cancel.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while stream.next().await.is_some() {}
        stream.errors.recv().await
    })
    .await
    .expect("producer did not stop");
    assert!(drained.is_none());
}
