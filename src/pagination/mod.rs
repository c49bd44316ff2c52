//! Pagination handling for Google Workspace list calls.
//!
//! List endpoints return a `nextPageToken`; an absent or empty token ends the
//! listing. [`paginate`] drains the pages on a background task and hands the
//! items out on a bounded channel, with a one-slot channel for the first error.

use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use crate::resilience::RetryExecutor;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Token for the next page (cursor-based pagination).
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a new page.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.filter(|token| !token.is_empty()),
        }
    }

    /// Creates the last page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maps the items in this page to a different type.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_page_token: self.next_page_token,
        }
    }
}

/// Iterator over all pages of a listing.
pub struct PageIterator<T, F, Fut>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = WorkspaceResult<Page<T>>>,
{
    fetch_fn: F,
    next_token: Option<String>,
    done: bool,
    retry: Option<(Arc<RetryExecutor>, ErrorKey)>,
    _marker: PhantomData<T>,
}

impl<T, F, Fut> PageIterator<T, F, Fut>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = WorkspaceResult<Page<T>>>,
{
    /// Creates a new page iterator.
    pub fn new(fetch_fn: F) -> Self {
        Self {
            fetch_fn,
            next_token: None,
            done: false,
            retry: None,
            _marker: PhantomData,
        }
    }

    /// Routes every page fetch through a retry executor.
    pub fn with_retry(mut self, executor: Arc<RetryExecutor>, key: ErrorKey) -> Self {
        self.retry = Some((executor, key));
        self
    }

    /// Fetches the next page of results.
    pub async fn next_page(&mut self) -> WorkspaceResult<Option<Page<T>>> {
        if self.done {
            return Ok(None);
        }

        let token = self.next_token.clone();
        let fetch_fn = &mut self.fetch_fn;
        let fetched = match &self.retry {
            Some((executor, key)) => executor.run_value(key, || fetch_fn(token.clone())).await,
            None => fetch_fn(token).await,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(error) => {
                self.done = true;
                return Err(error);
            }
        };

        match page.next_page_token.as_deref() {
            Some(next) if !next.is_empty() => self.next_token = Some(next.to_string()),
            _ => self.done = true,
        }

        Ok(Some(page))
    }

    /// Collects all remaining items from all pages.
    pub async fn collect_all(&mut self) -> WorkspaceResult<Vec<T>> {
        let mut all_items = Vec::new();

        while let Some(page) = self.next_page().await? {
            all_items.extend(page.items);
        }

        Ok(all_items)
    }

    /// Returns true if there are more pages to fetch.
    pub fn has_next(&self) -> bool {
        !self.done
    }
}

/// Items of a listing delivered by a background producer.
///
/// `items` closes after the last item; `errors` then holds at most one error.
#[derive(Debug)]
pub struct PageStream<T> {
    /// Listed items in upstream order.
    pub items: mpsc::Receiver<T>,
    /// The first error, if the listing failed.
    pub errors: mpsc::Receiver<WorkspaceError>,
}

impl<T> PageStream<T> {
    /// Receives the next item.
    pub async fn next(&mut self) -> Option<T> {
        self.items.recv().await
    }

    /// Waits for the listing to finish and returns its error, if any.
    ///
    /// Items still buffered are discarded.
    pub async fn finish(mut self) -> Option<WorkspaceError> {
        self.items.close();
        while self.items.recv().await.is_some() {}
        self.errors.recv().await
    }

    /// Drains every item, failing if the listing failed.
    pub async fn collect(mut self) -> WorkspaceResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.items.recv().await {
            items.push(item);
        }
        match self.errors.recv().await {
            Some(error) => Err(error),
            None => Ok(items),
        }
    }
}

/// Lists every page on a background task.
///
/// Each fetch runs through `executor`, so transient failures are retried and
/// terminal ones arrive on `errors` keyed with `key`. The item channel holds
/// `buffer` items. Cancelling `cancel` stops the producer before its next
/// fetch or send; both channels then close without an error.
pub async fn paginate<T, F, Fut>(
    executor: Arc<RetryExecutor>,
    key: ErrorKey,
    buffer: usize,
    cancel: CancellationToken,
    fetch: F,
) -> PageStream<T>
where
    T: Send + 'static,
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = WorkspaceResult<Page<T>>> + Send + 'static,
{
    let (item_tx, item_rx) = mpsc::channel(buffer.max(1));
    let (error_tx, error_rx) = mpsc::channel(1);
    let pacer = executor.pacer().clone();
    let mut pages = PageIterator::new(fetch).with_retry(executor, key.clone());

    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(error_key = %key, "Listing cancelled");
                    break;
                }
                next = pages.next_page() => next,
            };

            match next {
                Ok(Some(page)) => {
                    for item in page.items {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return,
                            sent = item_tx.send(item) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    let _ = error_tx.try_send(error);
                    break;
                }
            }
        }
    });

    pacer.pause().await;

    PageStream {
        items: item_rx,
        errors: error_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_creation() {
        let page = Page::new(vec![1, 2, 3], Some("token".to_string()));
        assert_eq!(page.len(), 3);
        assert!(page.has_next());
        assert!(!page.is_empty());
    }

    #[test]
    fn test_empty_token_is_last_page() {
        let page = Page::new(vec![1], Some(String::new()));
        assert!(!page.has_next());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![1, 2, 3], Some("token".to_string()));
        let mapped = page.map(|x| x * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.next_page_token, Some("token".to_string()));
    }

    #[tokio::test]
    async fn test_page_iterator() {
        let pages = vec![
            Page::new(vec![1, 2, 3], Some("token1".to_string())),
            Page::new(vec![4, 5, 6], Some("token2".to_string())),
            Page::new(vec![7, 8, 9], None),
        ];
        let mut seen_tokens = Vec::new();

        let mut iterator = PageIterator::new(|token: Option<String>| {
            seen_tokens.push(token.clone());
            let index = match token.as_deref() {
                None => 0,
                Some("token1") => 1,
                _ => 2,
            };
            let page = pages[index].clone();
            async move { Ok::<_, WorkspaceError>(page) }
        });

        let all_items = iterator.collect_all().await.unwrap();
        assert_eq!(all_items, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(!iterator.has_next());
        drop(iterator);
        assert_eq!(
            seen_tokens,
            vec![None, Some("token1".to_string()), Some("token2".to_string())]
        );
    }
}
