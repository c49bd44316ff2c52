//! Users service for the Admin SDK Directory API.

use crate::client::{encode_segment, RequestExecutor};
use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use crate::pagination::{paginate, Page, PageStream};
use crate::resilience::RetryExecutor;
use crate::transport::HttpMethod;
use crate::types::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Service for user operations.
pub struct UsersService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
}

impl UsersService {
    /// Creates a new users service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self { executor, retry }
    }

    /// Gets a user by primary email, alias or ID.
    pub async fn get(&self, user_key: &str, fields: Option<&str>) -> WorkspaceResult<User> {
        let key = ErrorKey::new([user_key]);
        let executor = &self.executor;
        self.retry
            .run_value(&key, || async move {
                let url = executor.build_url(
                    &executor.config().directory_url,
                    &format!("users/{}", encode_segment(user_key)),
                )?;
                let url = executor.with_query(url, &[("fields", fields)])?;
                executor.execute_json(HttpMethod::Get, url, None).await
            })
            .await
    }

    /// Lists one page of users.
    pub async fn list(&self, params: ListUsersParams) -> WorkspaceResult<UserList> {
        let params = self.scoped(params);
        let key = list_key(&params);
        let executor = &self.executor;
        let params = &params;
        self.retry
            .run_value(&key, || fetch_page(executor, params))
            .await
    }

    /// Streams every user matching `params`.
    pub async fn stream(
        &self,
        params: ListUsersParams,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<User> {
        self.stream_mapped(params, buffer, cancel, Some).await
    }

    /// Streams the primary email of every user in an organizational unit.
    pub async fn stream_org_unit_emails(
        &self,
        org_unit_path: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String> {
        self.stream_mapped(
            ListUsersParams::in_org_unit(org_unit_path),
            buffer,
            cancel,
            |user| Some(user.primary_email).filter(|email| !email.is_empty()),
        )
        .await
    }

    async fn stream_mapped<T>(
        &self,
        params: ListUsersParams,
        buffer: usize,
        cancel: CancellationToken,
        map: fn(User) -> Option<T>,
    ) -> PageStream<T>
    where
        T: Send + 'static,
    {
        let mut params = self.scoped(params);
        params.fields = list_fields(params.fields);
        let key = list_key(&params);
        let executor = self.executor.clone();

        paginate(self.retry.clone(), key, buffer, cancel, move |token| {
            let executor = executor.clone();
            let mut params = params.clone();
            params.page_token = token;
            async move {
                let list = fetch_page(&executor, &params).await?;
                let items = list.users.into_iter().filter_map(map).collect();
                Ok::<_, WorkspaceError>(Page::new(items, list.next_page_token))
            }
        })
        .await
    }

    fn scoped(&self, mut params: ListUsersParams) -> ListUsersParams {
        if params.customer.is_none() && params.domain.is_none() {
            params.customer = Some(self.executor.config().customer.clone());
        }
        params
    }
}

fn list_key(params: &ListUsersParams) -> ErrorKey {
    let scope = params
        .domain
        .as_deref()
        .or(params.customer.as_deref())
        .unwrap_or_default();
    let mut key = ErrorKey::new([scope]);
    if let Some(query) = &params.query {
        key = key.push(query);
    }
    key
}

async fn fetch_page(
    executor: &RequestExecutor,
    params: &ListUsersParams,
) -> WorkspaceResult<UserList> {
    let url = executor.build_url(&executor.config().directory_url, "users")?;
    let url = executor.with_query(url, params)?;
    executor.execute_json(HttpMethod::Get, url, None).await
}
