//! Drive folder migration.
//!
//! Moves the contents of a folder into a destination by cloning every
//! subfolder and reparenting every file under its clone. A single consumer
//! creates folders and lists their children; a pool of workers reparents the
//! listed files and feeds subfolders back to the consumer. A folder is always
//! cloned before any of its children is handled.

use crate::errors::WorkspaceError;
use crate::services::FilesService;
use crate::types::{CreateFolderRequest, DriveFile};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Source folder ID to the ID of its clone. Entries are never overwritten.
#[derive(Debug, Default)]
pub struct FolderMap {
    inner: Mutex<HashMap<String, String>>,
}

impl FolderMap {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a clone. Returns false, leaving the entry untouched, if the
    /// source folder was already mapped.
    pub fn insert(&self, source: impl Into<String>, clone: impl Into<String>) -> bool {
        let mut map = self.lock();
        match map.entry(source.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(clone.into());
                true
            }
        }
    }

    /// Returns the clone of a source folder.
    pub fn get(&self, source: &str) -> Option<String> {
        self.lock().get(source).cloned()
    }

    /// Number of mapped folders.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the mapping out.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.lock().clone()
    }
}

/// Children of one source folder, to be placed under its clone.
#[derive(Debug, Clone)]
pub struct ParentChildren {
    /// Clone the children move under.
    pub new_parent_id: String,
    /// Source folder the children were listed from.
    pub old_parent_id: String,
    /// Listed children.
    pub children: Vec<DriveFile>,
}

/// Outcome of a migration.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Folders cloned.
    pub folders_created: usize,
    /// Files reparented.
    pub files_moved: usize,
    /// Units that failed and were skipped.
    pub failures: usize,
    /// Source folder ID to clone ID, the migrated folder mapped to the destination.
    pub folder_map: HashMap<String, String>,
    /// Whether the migration was cancelled before finishing.
    pub cancelled: bool,
}

#[derive(Debug)]
struct FolderItem {
    new_parent_id: String,
    folder: DriveFile,
}

#[derive(Debug, Default)]
struct Counters {
    folders_created: AtomicUsize,
    files_moved: AtomicUsize,
    failures: AtomicUsize,
}

/// Work shared by the consumer and the workers.
///
/// `outstanding` counts queued folder items and child batches; the pipeline
/// stops when it drops to zero.
struct Pipeline {
    files: FilesService,
    drive_id: Option<String>,
    folder_map: FolderMap,
    counters: Counters,
    outstanding: AtomicUsize,
    done: CancellationToken,
}

impl Pipeline {
    fn begin(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.cancel();
        }
    }

    fn failed(&self, unit: &str, error: &WorkspaceError) {
        warn!(unit, error = %error, "Migration step failed, skipping");
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Lists a folder's children and queues them as one batch.
    async fn queue_children(
        &self,
        old_parent_id: &str,
        new_parent_id: &str,
        batches: &mpsc::Sender<ParentChildren>,
    ) {
        let children = match self
            .files
            .list_children(old_parent_id, self.drive_id.as_deref())
            .await
        {
            Ok(children) => children,
            Err(e) => {
                self.failed(old_parent_id, &e);
                return;
            }
        };
        if children.is_empty() {
            return;
        }

        self.begin();
        let batch = ParentChildren {
            new_parent_id: new_parent_id.to_string(),
            old_parent_id: old_parent_id.to_string(),
            children,
        };
        tokio::select! {
            biased;
            _ = self.done.cancelled() => {}
            sent = batches.send(batch) => {
                if sent.is_err() {
                    self.finish();
                }
            }
        }
    }

    async fn clone_folder(&self, item: FolderItem, batches: &mpsc::Sender<ParentChildren>) {
        let request = CreateFolderRequest::new(item.folder.name.clone(), item.new_parent_id.clone());
        let created = match self.files.create_folder(request).await {
            Ok(created) => created,
            Err(e) => {
                self.failed(&item.folder.id, &e);
                return;
            }
        };
        self.counters.folders_created.fetch_add(1, Ordering::Relaxed);
        if !self.folder_map.insert(item.folder.id.clone(), created.id.clone()) {
            warn!(folder_id = %item.folder.id, "Folder already migrated");
        }
        debug!(
            source = %item.folder.id,
            clone = %created.id,
            name = %item.folder.name,
            "Folder cloned"
        );

        self.queue_children(&item.folder.id, &created.id, batches).await;
    }

    async fn place_children(self: &Arc<Self>, batch: ParentChildren, folders: &mpsc::Sender<FolderItem>) {
        for child in batch.children {
            if self.done.is_cancelled() {
                return;
            }

            if child.is_folder() {
                self.begin();
                let item = FolderItem {
                    new_parent_id: batch.new_parent_id.clone(),
                    folder: child,
                };
                // Sent from its own task: the consumer may be blocked on a full batch channel.
                let pipeline = self.clone();
                let folders = folders.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = pipeline.done.cancelled() => {}
                        sent = folders.send(item) => {
                            if sent.is_err() {
                                pipeline.finish();
                            }
                        }
                    }
                });
                continue;
            }

            match self
                .files
                .move_file(&child.id, &batch.new_parent_id, &batch.old_parent_id)
                .await
            {
                Ok(_) => {
                    self.counters.files_moved.fetch_add(1, Ordering::Relaxed);
                    debug!(file_id = %child.id, new_parent = %batch.new_parent_id, "File moved");
                }
                Err(e) => self.failed(&child.id, &e),
            }
        }
    }
}

/// Drive folder migration driver.
#[derive(Clone)]
pub struct FolderMigrator {
    files: FilesService,
    workers: usize,
}

impl FolderMigrator {
    /// Creates a migrator with `workers` reparenting workers.
    ///
    /// `files` should carry the migration retry executor, see
    /// [`WorkspaceClient::migrator`](crate::WorkspaceClient::migrator).
    pub fn new(files: FilesService, workers: usize) -> Self {
        Self {
            files,
            workers: workers.max(1),
        }
    }

    /// Number of workers, also the capacity of both pipeline channels.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Files service used for every call.
    pub fn files(&self) -> &FilesService {
        &self.files
    }

    /// Moves everything under `source` into `destination_parent`.
    ///
    /// Subfolders are recreated by name; files get the clone of their listed
    /// folder added as parent and that folder removed, other parents stay.
    /// With `target_drive_id` child listings are scoped to that shared drive.
    /// Failed steps are logged and counted; a folder that cannot be cloned or
    /// listed is skipped along with its subtree.
    pub async fn migrate(
        &self,
        source: &str,
        destination_parent: &str,
        target_drive_id: Option<&str>,
        cancel: CancellationToken,
    ) -> MigrationReport {
        info!(source, destination_parent, workers = self.workers, "Starting folder migration");

        let pipeline = Arc::new(Pipeline {
            files: self.files.clone(),
            drive_id: target_drive_id.map(str::to_string),
            folder_map: FolderMap::default(),
            counters: Counters::default(),
            outstanding: AtomicUsize::new(1),
            done: cancel.child_token(),
        });
        pipeline.folder_map.insert(source, destination_parent);

        let (folder_tx, mut folder_rx) = mpsc::channel::<FolderItem>(self.workers);
        let (batch_tx, batch_rx) = mpsc::channel::<ParentChildren>(self.workers);
        let batch_rx = Arc::new(AsyncMutex::new(batch_rx));

        let consumer = {
            let pipeline = pipeline.clone();
            let batch_tx = batch_tx.clone();
            tokio::spawn(async move {
                loop {
                    let item = tokio::select! {
                        biased;
                        _ = pipeline.done.cancelled() => break,
                        item = folder_rx.recv() => item,
                    };
                    let Some(item) = item else {
                        break;
                    };
                    pipeline.clone_folder(item, &batch_tx).await;
                    pipeline.finish();
                }
            })
        };

        let mut workers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let pipeline = pipeline.clone();
            let batch_rx = batch_rx.clone();
            let folder_tx = folder_tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let batch = {
                        let mut batches = tokio::select! {
                            biased;
                            _ = pipeline.done.cancelled() => break,
                            batches = batch_rx.lock() => batches,
                        };
                        tokio::select! {
                            biased;
                            _ = pipeline.done.cancelled() => break,
                            batch = batches.recv() => batch,
                        }
                    };
                    let Some(batch) = batch else {
                        break;
                    };
                    pipeline.place_children(batch, &folder_tx).await;
                    pipeline.finish();
                }
            }));
        }
        drop(folder_tx);

        pipeline
            .queue_children(source, destination_parent, &batch_tx)
            .await;
        drop(batch_tx);
        pipeline.finish();

        pipeline.done.cancelled().await;
        if let Err(e) = consumer.await {
            warn!(error = %e, "Folder consumer panicked");
        }
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Migration worker panicked");
            }
        }

        let report = MigrationReport {
            folders_created: pipeline.counters.folders_created.load(Ordering::Relaxed),
            files_moved: pipeline.counters.files_moved.load(Ordering::Relaxed),
            failures: pipeline.counters.failures.load(Ordering::Relaxed),
            folder_map: pipeline.folder_map.snapshot(),
            cancelled: cancel.is_cancelled(),
        };
        info!(
            folders_created = report.folders_created,
            files_moved = report.files_moved,
            failures = report.failures,
            cancelled = report.cancelled,
            "Folder migration finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_map_insert_only() {
        let map = FolderMap::default();
        assert!(map.is_empty());
        assert!(map.insert("src", "dst"));
        assert!(!map.insert("src", "other"));
        assert_eq!(map.get("src").as_deref(), Some("dst"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.snapshot().get("src").map(String::as_str), Some("dst"));
    }
}
