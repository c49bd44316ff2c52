//! Unique user aggregation across organizational units and groups.
//!
//! Two producers list users of organizational units and user members of
//! groups onto one raw channel; a dedup stage owning the seen-set forwards
//! each primary email once.

use crate::errors::WorkspaceError;
use crate::pagination::PageStream;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Default capacity of the aggregation channels.
pub const DEFAULT_BUFFER: usize = 100;

/// Source of user emails for the aggregator.
#[async_trait]
pub trait UserSource: Send + Sync {
    /// Streams the primary email of every user in an organizational unit.
    async fn org_unit_users(
        &self,
        org_unit_path: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String>;

    /// Streams the email of every user member of a group, nested groups expanded.
    async fn group_users(
        &self,
        group_email: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String>;
}

/// How list failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMode {
    /// Log list failures and keep going.
    #[default]
    BestEffort,
    /// Report the first list failure and stop producing.
    Strict,
}

/// Aggregation options.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Capacity of the raw and output channels.
    pub buffer: usize,
    /// Failure handling.
    pub mode: AggregationMode,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
            mode: AggregationMode::BestEffort,
        }
    }
}

impl AggregateOptions {
    /// Options reporting the first list failure.
    pub fn strict() -> Self {
        Self {
            mode: AggregationMode::Strict,
            ..Self::default()
        }
    }
}

/// Output of [`unique_users`].
#[derive(Debug)]
pub struct UniqueUsers {
    /// Deduplicated primary emails.
    pub users: mpsc::Receiver<String>,
    /// The first list failure, in strict mode only.
    pub errors: mpsc::Receiver<WorkspaceError>,
}

impl UniqueUsers {
    /// Receives the next email.
    pub async fn next(&mut self) -> Option<String> {
        self.users.recv().await
    }

    /// Drains every email, failing if a list failure was reported.
    pub async fn collect(mut self) -> Result<Vec<String>, WorkspaceError> {
        let mut users = Vec::new();
        while let Some(user) = self.users.recv().await {
            users.push(user);
        }
        match self.errors.recv().await {
            Some(error) => Err(error),
            None => Ok(users),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    OrgUnit,
    Group,
}

/// Aggregates unique user emails from organizational units and groups.
///
/// Must be called from within a Tokio runtime. Each email appears at most once
/// on `users`; no order is guaranteed across the two producers.
pub fn unique_users<S>(
    source: Arc<S>,
    org_units: Vec<String>,
    group_emails: Vec<String>,
    options: AggregateOptions,
    cancel: CancellationToken,
) -> UniqueUsers
where
    S: UserSource + ?Sized + 'static,
{
    let buffer = options.buffer.max(1);
    let (raw_tx, mut raw_rx) = mpsc::channel::<String>(buffer);
    let (out_tx, out_rx) = mpsc::channel(buffer);
    let (error_tx, error_rx) = mpsc::channel(1);
    let stop = cancel.child_token();

    for (origin, inputs) in [(Origin::OrgUnit, org_units), (Origin::Group, group_emails)] {
        tokio::spawn(produce(
            source.clone(),
            origin,
            inputs,
            buffer,
            raw_tx.clone(),
            error_tx.clone(),
            options.mode,
            stop.clone(),
        ));
    }
    drop(raw_tx);
    drop(error_tx);

    tokio::spawn(async move {
        let mut seen = HashSet::new();
        loop {
            let email = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                email = raw_rx.recv() => email,
            };
            let Some(email) = email else {
                break;
            };
            if !seen.insert(email.clone()) {
                continue;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = out_tx.send(email) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(unique = seen.len(), "Unique user aggregation finished");
    });

    UniqueUsers {
        users: out_rx,
        errors: error_rx,
    }
}

#[allow(clippy::too_many_arguments)]
async fn produce<S>(
    source: Arc<S>,
    origin: Origin,
    inputs: Vec<String>,
    buffer: usize,
    raw: mpsc::Sender<String>,
    errors: mpsc::Sender<WorkspaceError>,
    mode: AggregationMode,
    stop: CancellationToken,
) where
    S: UserSource + ?Sized,
{
    for input in inputs {
        if stop.is_cancelled() {
            return;
        }

        let mut stream = match origin {
            Origin::OrgUnit => source.org_unit_users(&input, buffer, stop.clone()).await,
            Origin::Group => source.group_users(&input, buffer, stop.clone()).await,
        };

        loop {
            let item = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                item = stream.items.recv() => item,
            };
            let Some(email) = item else {
                break;
            };
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                sent = raw.send(email) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }

        if let Some(failure) = stream.errors.recv().await {
            match mode {
                AggregationMode::BestEffort => {
                    warn!(source = ?origin, input = %input, error = %failure, "Listing users failed");
                }
                AggregationMode::Strict => {
                    error!(source = ?origin, input = %input, error = %failure, "Listing users failed");
                    let _ = errors.try_send(failure);
                    stop.cancel();
                    return;
                }
            }
        }
    }
}
