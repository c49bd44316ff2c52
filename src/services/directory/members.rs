//! Members service for the Admin SDK Directory API.

use crate::client::{encode_segment, RequestExecutor};
use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use crate::pagination::{paginate, Page, PageStream};
use crate::resilience::RetryExecutor;
use crate::transport::HttpMethod;
use crate::types::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Service for group membership operations.
pub struct MembersService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
}

impl MembersService {
    /// Creates a new members service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self { executor, retry }
    }

    /// Lists one page of a group's members.
    pub async fn list(
        &self,
        group_key: &str,
        params: ListMembersParams,
    ) -> WorkspaceResult<MemberList> {
        let key = ErrorKey::new([group_key]);
        let executor = &self.executor;
        let params = &params;
        self.retry
            .run_value(&key, || fetch_page(executor, group_key, params))
            .await
    }

    /// Streams every member of a group.
    pub async fn stream(
        &self,
        group_key: &str,
        params: ListMembersParams,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<Member> {
        self.stream_mapped(group_key, params, buffer, cancel, Some)
            .await
    }

    /// Streams the email of every user reachable from a group, nested groups expanded.
    pub async fn stream_user_emails(
        &self,
        group_key: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String> {
        self.stream_mapped(
            group_key,
            ListMembersParams::transitive(),
            buffer,
            cancel,
            |member| member.is_user().then_some(member.email),
        )
        .await
    }

    /// Adds a member to a group.
    pub async fn insert(
        &self,
        group_key: &str,
        request: InsertMemberRequest,
    ) -> WorkspaceResult<Member> {
        let key = ErrorKey::new([group_key, request.email.as_str()]);
        let executor = &self.executor;
        let body = RequestExecutor::json_body(&request).map_err(|e| e.with_key(&key))?;
        let body = &body;
        self.retry
            .run_value(&key, || async move {
                let url = executor.build_url(
                    &executor.config().directory_url,
                    &format!("groups/{}/members", encode_segment(group_key)),
                )?;
                executor
                    .execute_json(HttpMethod::Post, url, Some(body.clone()))
                    .await
            })
            .await
    }

    /// Removes a member from a group.
    pub async fn delete(&self, group_key: &str, member_key: &str) -> WorkspaceResult<()> {
        let key = ErrorKey::new([group_key, member_key]);
        let executor = &self.executor;
        self.retry
            .run_action(&key, || async move {
                let url = executor.build_url(
                    &executor.config().directory_url,
                    &format!(
                        "groups/{}/members/{}",
                        encode_segment(group_key),
                        encode_segment(member_key)
                    ),
                )?;
                executor.execute_empty(HttpMethod::Delete, url).await
            })
            .await
    }

    async fn stream_mapped<T>(
        &self,
        group_key: &str,
        mut params: ListMembersParams,
        buffer: usize,
        cancel: CancellationToken,
        map: fn(Member) -> Option<T>,
    ) -> PageStream<T>
    where
        T: Send + 'static,
    {
        params.fields = list_fields(params.fields);
        let key = ErrorKey::new([group_key]);
        let executor = self.executor.clone();
        let group_key = group_key.to_string();

        paginate(self.retry.clone(), key, buffer, cancel, move |token| {
            let executor = executor.clone();
            let group_key = group_key.clone();
            let mut params = params.clone();
            params.page_token = token;
            async move {
                let list = fetch_page(&executor, &group_key, &params).await?;
                let items = list.members.into_iter().filter_map(map).collect();
                Ok::<_, WorkspaceError>(Page::new(items, list.next_page_token))
            }
        })
        .await
    }
}

async fn fetch_page(
    executor: &RequestExecutor,
    group_key: &str,
    params: &ListMembersParams,
) -> WorkspaceResult<MemberList> {
    let url = executor.build_url(
        &executor.config().directory_url,
        &format!("groups/{}/members", encode_segment(group_key)),
    )?;
    let url = executor.with_query(url, params)?;
    executor.execute_json(HttpMethod::Get, url, None).await
}
