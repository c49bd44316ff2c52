//! Files service for the Drive v3 API.
//!
//! Every call sets `supportsAllDrives=true` so shared drive items are reachable.

use crate::client::{encode_segment, RequestExecutor};
use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use crate::pagination::{paginate, Page, PageIterator, PageStream};
use crate::resilience::RetryExecutor;
use crate::transport::HttpMethod;
use crate::types::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const FILE_FIELDS: &str = "id,name,mimeType,parents,driveId";

/// Service for file operations.
#[derive(Clone)]
pub struct FilesService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
}

impl FilesService {
    /// Creates a new files service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self { executor, retry }
    }

    /// Returns a copy of this service bound to another retry executor.
    pub fn with_retry(&self, retry: Arc<RetryExecutor>) -> Self {
        Self {
            executor: self.executor.clone(),
            retry,
        }
    }

    /// Returns the retry executor.
    pub fn retry(&self) -> &Arc<RetryExecutor> {
        &self.retry
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    /// Gets file metadata.
    pub async fn get(&self, file_id: &str, params: Option<GetFileParams>) -> WorkspaceResult<DriveFile> {
        let key = ErrorKey::new([file_id]);
        let mut params = params.unwrap_or_default();
        params.supports_all_drives = Some(true);
        let executor = &self.executor;
        let params = &params;
        self.retry
            .run_value(&key, || async move {
                let url = executor.build_url(
                    &executor.config().drive_url,
                    &format!("files/{}", encode_segment(file_id)),
                )?;
                let url = executor.with_query(url, params)?;
                executor.execute_json(HttpMethod::Get, url, None).await
            })
            .await
    }

    /// Lists one page of files.
    pub async fn list(&self, params: ListFilesParams) -> WorkspaceResult<FileList> {
        let key = list_key(&params);
        let executor = &self.executor;
        let params = &params;
        self.retry
            .run_value(&key, || fetch_page(executor, params))
            .await
    }

    /// Streams every file matching `params`.
    pub async fn stream(
        &self,
        mut params: ListFilesParams,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<DriveFile> {
        params.fields = list_fields(params.fields);
        let key = list_key(&params);
        let executor = self.executor.clone();

        paginate(self.retry.clone(), key, buffer, cancel, move |token| {
            let executor = executor.clone();
            let mut params = params.clone();
            params.page_token = token;
            async move {
                let list = fetch_page(&executor, &params).await?;
                Ok::<_, WorkspaceError>(Page::new(list.files, list.next_page_token))
            }
        })
        .await
    }

    /// Lists every non-trashed child of a folder.
    ///
    /// With `drive_id` the listing is scoped to that shared drive.
    pub async fn list_children(
        &self,
        folder_id: &str,
        drive_id: Option<&str>,
    ) -> WorkspaceResult<Vec<DriveFile>> {
        let mut params = ListFilesParams::children_of(folder_id, drive_id);
        params.fields = list_fields(params.fields);
        let executor = self.executor.clone();

        let mut pages = PageIterator::new(move |token| {
            let executor = executor.clone();
            let mut params = params.clone();
            params.page_token = token;
            async move {
                let list = fetch_page(&executor, &params).await?;
                Ok::<_, WorkspaceError>(Page::new(list.files, list.next_page_token))
            }
        })
        .with_retry(self.retry.clone(), ErrorKey::new([folder_id]));

        let children = pages.collect_all().await?;
        debug!(folder_id, count = children.len(), "Listed folder children");
        Ok(children)
    }

    // ========================================================================
    // Write Operations
    // ========================================================================

    /// Creates a folder.
    pub async fn create_folder(&self, request: CreateFolderRequest) -> WorkspaceResult<DriveFile> {
        let mut tokens = vec![request.name.clone()];
        tokens.extend(request.parents.iter().cloned());
        let key = ErrorKey::new(tokens);

        let body = RequestExecutor::json_body(&request).map_err(|e| e.with_key(&key))?;
        let executor = &self.executor;
        let body = &body;
        self.retry
            .run_value(&key, || async move {
                let url = executor.build_url(&executor.config().drive_url, "files")?;
                let url = executor.with_query(
                    url,
                    &[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)],
                )?;
                executor
                    .execute_json(HttpMethod::Post, url, Some(body.clone()))
                    .await
            })
            .await
    }

    /// Updates file metadata and parents.
    pub async fn update(
        &self,
        file_id: &str,
        request: UpdateFileRequest,
        mut params: UpdateFileParams,
    ) -> WorkspaceResult<DriveFile> {
        let key = ErrorKey::new([file_id]);
        params.supports_all_drives = Some(true);
        if params.fields.is_none() {
            params.fields = Some(FILE_FIELDS.to_string());
        }

        let body = RequestExecutor::json_body(&request).map_err(|e| e.with_key(&key))?;
        let executor = &self.executor;
        let body = &body;
        let params = &params;
        self.retry
            .run_value(&key, || async move {
                let url = executor.build_url(
                    &executor.config().drive_url,
                    &format!("files/{}", encode_segment(file_id)),
                )?;
                let url = executor.with_query(url, params)?;
                executor
                    .execute_json(HttpMethod::Patch, url, Some(body.clone()))
                    .await
            })
            .await
    }

    /// Moves a file by adding `add_parent` and removing `remove_parent`.
    ///
    /// Other parents of the file are left untouched.
    pub async fn move_file(
        &self,
        file_id: &str,
        add_parent: &str,
        remove_parent: &str,
    ) -> WorkspaceResult<DriveFile> {
        let params = UpdateFileParams {
            add_parents: Some(add_parent.to_string()),
            remove_parents: Some(remove_parent.to_string()),
            ..Default::default()
        };
        self.update(file_id, UpdateFileRequest::default(), params)
            .await
    }
}

fn list_key(params: &ListFilesParams) -> ErrorKey {
    ErrorKey::new([params.q.as_deref().unwrap_or("files")])
}

async fn fetch_page(executor: &RequestExecutor, params: &ListFilesParams) -> WorkspaceResult<FileList> {
    let mut params = params.clone();
    params.supports_all_drives = Some(true);
    let url = executor.build_url(&executor.config().drive_url, "files")?;
    let url = executor.with_query(url, &params)?;
    executor.execute_json(HttpMethod::Get, url, None).await
}
