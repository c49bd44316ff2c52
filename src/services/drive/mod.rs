//! Drive v3 API services.

use crate::client::RequestExecutor;
use crate::resilience::RetryExecutor;
use std::sync::{Arc, OnceLock};

mod files;

pub use files::FilesService;

/// Root handle of the Drive API family.
pub struct DriveService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
    files: OnceLock<Arc<FilesService>>,
}

impl DriveService {
    /// Creates a new Drive service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self {
            executor,
            retry,
            files: OnceLock::new(),
        }
    }

    /// Returns the files service.
    pub fn files(&self) -> Arc<FilesService> {
        self.files
            .get_or_init(|| Arc::new(FilesService::new(self.executor.clone(), self.retry.clone())))
            .clone()
    }
}
