//! CSV batch driver.
//!
//! Every CSV line becomes one [`ParameterMap`] on a bounded channel. Flags are
//! resolved and column indices validated before any row is emitted, so a
//! misused flag never touches the file's data rows or the API.

use crate::config::{max_threads, DEFAULT_THREADS};
use crate::errors::{BatchError, ErrorKey, WorkspaceError, WorkspaceResult};
use crate::schema::{BatchPlan, CommandSchema, Invocation, ParameterMap};
use csv::{Reader, ReaderBuilder, StringRecord};
use futures::StreamExt;
use std::fs::File;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default CSV delimiter.
pub const DEFAULT_DELIMITER: u8 = b';';

/// Batch file options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// CSV file path.
    pub path: PathBuf,
    /// Field delimiter.
    pub delimiter: u8,
    /// Whether the first line is a header to discard.
    pub skip_header: bool,
    /// Row channel capacity and worker count, capped at 16.
    pub parallelism: usize,
}

impl BatchOptions {
    /// Options for a file with the default delimiter and parallelism.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: DEFAULT_DELIMITER,
            skip_header: false,
            parallelism: DEFAULT_THREADS,
        }
    }

    /// Sets the delimiter.
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Discards the first line.
    pub fn skip_header(mut self, skip: bool) -> Self {
        self.skip_header = skip;
        self
    }

    /// Sets the parallelism.
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }
}

/// Rows of a running batch.
#[derive(Debug)]
pub struct BatchStream {
    /// One parameter map per accepted line, in file order.
    pub rows: mpsc::Receiver<ParameterMap>,
    /// Lines that could not be read or coerced.
    pub errors: mpsc::UnboundedReceiver<WorkspaceError>,
    parallelism: usize,
}

impl BatchStream {
    /// Receives the next row.
    pub async fn next(&mut self) -> Option<ParameterMap> {
        self.rows.recv().await
    }

    /// Parallelism the batch was opened with.
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Runs `worker` over every row with at most `parallelism` rows in flight.
    ///
    /// Returns the number of rows handed to the worker. Outcomes are the
    /// worker's business.
    pub async fn run<F, Fut>(&mut self, parallelism: usize, worker: F) -> usize
    where
        F: Fn(ParameterMap) -> Fut,
        Fut: Future<Output = ()>,
    {
        let processed = AtomicUsize::new(0);
        let rows = futures::stream::unfold(&mut self.rows, |rows| async move {
            rows.recv().await.map(|row| (row, rows))
        });
        rows.for_each_concurrent(max_threads(Some(parallelism), None), |row| {
            processed.fetch_add(1, Ordering::Relaxed);
            worker(row)
        })
        .await;
        processed.into_inner()
    }

    /// Drains the error side channel.
    pub fn take_errors(&mut self) -> Vec<WorkspaceError> {
        let mut errors = Vec::new();
        while let Ok(error) = self.errors.try_recv() {
            errors.push(error);
        }
        errors
    }
}

/// Drives a command over a CSV file.
pub struct BatchDriver;

impl BatchDriver {
    /// Opens a batch.
    ///
    /// Fails before any row is emitted on flag conflicts, unknown or missing
    /// required flags, bad `_ALL` literals, an unreadable or empty file, and
    /// column indices outside the first line. Lines failing to read or coerce
    /// afterwards are logged and reported on [`BatchStream::errors`].
    pub async fn for_each_row(
        schema: &CommandSchema,
        invocation: &Invocation,
        options: BatchOptions,
        cancel: CancellationToken,
    ) -> WorkspaceResult<BatchStream> {
        let plan = schema.resolve_batch(invocation)?;
        let parallelism = max_threads(Some(options.parallelism), None);

        let opened = {
            let options = options.clone();
            tokio::task::spawn_blocking(move || open(&options))
                .await
                .map_err(|e| BatchError::Read {
                    line: 1,
                    message: e.to_string(),
                })??
        };
        let (reader, first) = opened;
        plan.validate_columns(first.len())?;
        debug!(
            path = %options.path.display(),
            columns = first.len(),
            command = plan.command(),
            "Batch file opened"
        );

        let (row_tx, row_rx) = mpsc::channel(parallelism);
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let handle = Handle::current();
        let first = (!options.skip_header).then_some(first);
        let path = options.path.display().to_string();

        tokio::task::spawn_blocking(move || {
            let emitter = RowEmitter {
                plan,
                rows: row_tx,
                errors: error_tx,
                handle,
                cancel,
            };
            let emitted = emitter.emit_all(reader, first);
            info!(path = %path, rows = emitted, "Batch file exhausted");
        });

        Ok(BatchStream {
            rows: row_rx,
            errors: error_rx,
            parallelism,
        })
    }
}

fn open(options: &BatchOptions) -> Result<(Reader<File>, StringRecord), BatchError> {
    let path = options.path.display().to_string();
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_path(&options.path)
        .map_err(|e| BatchError::Open {
            path: path.clone(),
            message: e.to_string(),
        })?;

    let mut first = StringRecord::new();
    let found = reader.read_record(&mut first).map_err(|e| BatchError::Read {
        line: 1,
        message: e.to_string(),
    })?;
    if !found {
        return Err(BatchError::Empty(path));
    }
    Ok((reader, first))
}

/// 1-based file line a record starts on.
fn file_line(record: &StringRecord, fallback: u64) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(fallback)
}

struct RowEmitter {
    plan: BatchPlan,
    rows: mpsc::Sender<ParameterMap>,
    errors: mpsc::UnboundedSender<WorkspaceError>,
    handle: Handle,
    cancel: CancellationToken,
}

impl RowEmitter {
    /// Emits every line; returns the number of rows sent.
    fn emit_all(&self, mut reader: Reader<File>, first: Option<StringRecord>) -> usize {
        let mut emitted = 0;

        if let Some(first) = first {
            match self.emit(file_line(&first, 1), &first) {
                Some(true) => emitted += 1,
                Some(false) => {}
                None => return emitted,
            }
        }

        let mut record = StringRecord::new();
        loop {
            if self.cancel.is_cancelled() {
                debug!(line = reader.position().line(), "Batch cancelled");
                break;
            }
            match reader.read_record(&mut record) {
                Ok(true) => {
                    let line = file_line(&record, reader.position().line());
                    match self.emit(line, &record) {
                        Some(true) => emitted += 1,
                        Some(false) => {}
                        None => break,
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    let line = e
                        .position()
                        .map(|p| p.line())
                        .unwrap_or_else(|| reader.position().line());
                    let failure = WorkspaceError::from(BatchError::Read {
                        line,
                        message: e.to_string(),
                    });
                    self.report(failure);
                }
            }
        }
        emitted
    }

    /// Sends one row. `Some(false)` when the line was rejected, `None` when
    /// the batch stopped.
    fn emit(&self, line: u64, record: &StringRecord) -> Option<bool> {
        let cells: Vec<&str> = record.iter().collect();
        let params = match self.plan.row(&cells) {
            Ok(params) => params,
            Err(e) => {
                let key = ErrorKey::new([format!("line {}", line)]);
                self.report(WorkspaceError::from(e).with_key(&key));
                return Some(false);
            }
        };

        let rows = &self.rows;
        let cancel = &self.cancel;
        self.handle.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                sent = rows.send(params) => sent.ok().map(|_| true),
            }
        })
    }

    fn report(&self, failure: WorkspaceError) {
        warn!(error = %failure, "Skipping batch line");
        let _ = self.errors.send(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = BatchOptions::new("users.csv");
        assert_eq!(options.delimiter, b';');
        assert!(!options.skip_header);
        assert_eq!(options.parallelism, 4);

        let options = options.delimiter(b',').skip_header(true).parallelism(32);
        assert_eq!(options.delimiter, b',');
        assert!(options.skip_header);
        assert_eq!(max_threads(Some(options.parallelism), None), 16);
    }

    #[test]
    fn test_open_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = open(&BatchOptions::new(file.path()));
        assert!(matches!(result, Err(BatchError::Empty(_))));
    }

    #[test]
    fn test_open_missing_file() {
        let result = open(&BatchOptions::new("/nonexistent/batch.csv"));
        assert!(matches!(result, Err(BatchError::Open { .. })));
    }
}
