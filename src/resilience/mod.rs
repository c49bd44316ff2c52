//! Retry and pacing for Google Workspace API calls.
//!
//! Google reports quota and rate exhaustion as HTTP 403 with a handful of
//! message phrasings. The [`RetryExecutor`] retries exactly those (or, for the
//! Drive migration, every 403) with exponential backoff, and paces every call
//! with a standard delay plus jitter so concurrent workers do not burst in step.

use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use rand::Rng;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Whether to add jitter to backoff.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// Policy of the standard executor: 4 retries starting at 20 seconds.
    pub fn standard() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_secs(20),
            max_backoff: Duration::from_secs(160),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Policy of the Drive migration: 10 attempts from 250 ms, capped at 60 seconds.
    pub fn migration() -> Self {
        Self {
            max_retries: 9,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial backoff duration.
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Sets the maximum backoff duration.
    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64();
        let exp = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let mut delay = (base * exp).min(self.max_backoff.as_secs_f64());

        if self.jitter && delay > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..=delay * 0.1);
            delay += jitter;
        }

        Duration::from_secs_f64(delay)
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Standard delay plus random jitter, applied after every API call.
#[derive(Debug, Clone)]
pub struct Pacer {
    standard_delay: Duration,
    jitter_ms: RangeInclusive<u64>,
}

impl Pacer {
    /// Creates a pacer.
    pub fn new(standard_delay: Duration, jitter_ms: RangeInclusive<u64>) -> Self {
        Self {
            standard_delay,
            jitter_ms,
        }
    }

    /// A pacer that never sleeps.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0..=0)
    }

    /// Returns the next pause.
    pub fn next_delay(&self) -> Duration {
        let (low, high) = (*self.jitter_ms.start(), *self.jitter_ms.end());
        let jitter = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };
        self.standard_delay + Duration::from_millis(jitter)
    }

    /// Sleeps for the next pause.
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 1..=50)
    }
}

/// Rule deciding which failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Classifier {
    /// HTTP 403 whose message names a quota, rate or limit.
    #[default]
    Transient,
    /// Any HTTP 403.
    Forbidden,
}

impl Classifier {
    /// Returns true if the error should be retried.
    pub fn should_retry(&self, error: &WorkspaceError) -> bool {
        match self {
            Classifier::Transient => error.is_retryable(),
            Classifier::Forbidden => error.is_forbidden(),
        }
    }
}

/// Executes API calls with classification, backoff and pacing.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    pacer: Pacer,
    classifier: Classifier,
}

impl RetryExecutor {
    /// Creates an executor retrying transient 403s.
    pub fn new(policy: RetryPolicy, pacer: Pacer) -> Self {
        Self {
            policy,
            pacer,
            classifier: Classifier::Transient,
        }
    }

    /// Replaces the classifier.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the pacer.
    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Runs an operation producing a value.
    ///
    /// On failure the returned error carries `key`, so it reads `"<key>: <error>"`.
    pub async fn run_value<T, F, Fut>(&self, key: &ErrorKey, mut operation: F) -> WorkspaceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = WorkspaceResult<T>>,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!(error_key = %key, retries, "Operation succeeded after retry");
                    }
                    self.pacer.pause().await;
                    return Ok(value);
                }
                Err(error) => {
                    let retryable = self.classifier.should_retry(&error);
                    if retryable && retries < self.policy.max_retries {
                        retries += 1;
                        warn!(error_key = %key, retry = retries, "{}: {} - Retrying...", key, error);
                        self.pacer.pause().await;
                        tokio::time::sleep(self.policy.backoff(retries)).await;
                        continue;
                    }

                    if retryable {
                        warn!(
                            error_key = %key,
                            max_retries = self.policy.max_retries,
                            error = %error,
                            "Operation failed after all retries"
                        );
                    }
                    self.pacer.pause().await;
                    return Err(error.with_key(key));
                }
            }
        }
    }

    /// Runs an operation that only reports success or failure.
    ///
    /// `Ok(())` means the final attempt succeeded.
    pub async fn run_action<F, Fut>(&self, key: &ErrorKey, operation: F) -> WorkspaceResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = WorkspaceResult<()>>,
    {
        self.run_value(key, operation).await
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::standard(), Pacer::default())
    }
}
