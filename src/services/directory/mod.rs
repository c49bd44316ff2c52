//! Admin SDK Directory API services.

use crate::aggregate::UserSource;
use crate::client::RequestExecutor;
use crate::pagination::PageStream;
use crate::resilience::RetryExecutor;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

mod members;
mod users;

pub use members::MembersService;
pub use users::UsersService;

/// Root handle of the Directory API family.
pub struct DirectoryService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
    users: OnceLock<Arc<UsersService>>,
    members: OnceLock<Arc<MembersService>>,
}

impl DirectoryService {
    /// Creates a new Directory service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self {
            executor,
            retry,
            users: OnceLock::new(),
            members: OnceLock::new(),
        }
    }

    /// Returns the users service.
    pub fn users(&self) -> Arc<UsersService> {
        self.users
            .get_or_init(|| Arc::new(UsersService::new(self.executor.clone(), self.retry.clone())))
            .clone()
    }

    /// Returns the members service.
    pub fn members(&self) -> Arc<MembersService> {
        self.members
            .get_or_init(|| {
                Arc::new(MembersService::new(self.executor.clone(), self.retry.clone()))
            })
            .clone()
    }
}

#[async_trait]
impl UserSource for DirectoryService {
    async fn org_unit_users(
        &self,
        org_unit_path: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String> {
        self.users()
            .stream_org_unit_emails(org_unit_path, buffer, cancel)
            .await
    }

    async fn group_users(
        &self,
        group_email: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> PageStream<String> {
        self.members()
            .stream_user_emails(group_email, buffer, cancel)
            .await
    }
}
