//! Google Workspace client and service registry.
//!
//! One [`WorkspaceClient`] owns the injected transport and hands out a single
//! memoized handle per API family.

use crate::aggregate::{unique_users, AggregateOptions, UniqueUsers};
use crate::auth::AuthProvider;
use crate::config::WorkspaceConfig;
use crate::errors::{ConfigurationError, WorkspaceResult};
use crate::migration::FolderMigrator;
use crate::resilience::{Classifier, RetryExecutor};
use crate::services::*;
use crate::transport::HttpTransport;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod executor;
pub use executor::{encode_segment, handle_error_response, RequestExecutor};

/// Google Workspace API client.
///
/// This is the main entry point. Service handles are constructed on first use
/// and shared afterwards; the client is `Send + Sync` and may be shared across
/// tasks behind an `Arc`.
pub struct WorkspaceClient {
    /// Configuration.
    config: Arc<WorkspaceConfig>,
    /// Request executor shared by every service.
    executor: Arc<RequestExecutor>,
    /// Standard retry executor.
    retry: Arc<RetryExecutor>,
    directory: OnceLock<Arc<DirectoryService>>,
    drive: OnceLock<Arc<DriveService>>,
    contacts: OnceLock<Arc<ContactsService>>,
}

impl WorkspaceClient {
    /// Creates a new client builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use google_workspace::{ReqwestTransport, WorkspaceClient, WorkspaceConfig};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = WorkspaceConfig::builder().threads(8).build()?;
    /// let transport = ReqwestTransport::from_config(&config)?;
    ///
    /// let client = WorkspaceClient::builder()
    ///     .transport(transport)
    ///     .config(config)
    ///     .build()?;
    /// let users = client.directory().users();
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> WorkspaceClientBuilder {
        WorkspaceClientBuilder::new()
    }

    /// Returns the Directory service.
    pub fn directory(&self) -> Arc<DirectoryService> {
        self.directory
            .get_or_init(|| {
                debug!("Constructing Directory service");
                Arc::new(DirectoryService::new(self.executor.clone(), self.retry.clone()))
            })
            .clone()
    }

    /// Returns the Drive service.
    pub fn drive(&self) -> Arc<DriveService> {
        self.drive
            .get_or_init(|| {
                debug!("Constructing Drive service");
                Arc::new(DriveService::new(self.executor.clone(), self.retry.clone()))
            })
            .clone()
    }

    /// Returns the Shared Contacts service.
    pub fn contacts(&self) -> Arc<ContactsService> {
        self.contacts
            .get_or_init(|| {
                debug!("Constructing Shared Contacts service");
                Arc::new(ContactsService::new(self.executor.clone(), self.retry.clone()))
            })
            .clone()
    }

    /// Streams the deduplicated primary emails of every user in `org_units`
    /// and every user member of `group_emails`.
    pub fn unique_users(
        &self,
        org_units: Vec<String>,
        group_emails: Vec<String>,
        options: AggregateOptions,
        cancel: CancellationToken,
    ) -> UniqueUsers {
        unique_users(self.directory(), org_units, group_emails, options, cancel)
    }

    /// Returns a folder migrator using the migration retry policy, which
    /// retries every HTTP 403.
    pub fn migrator(&self) -> FolderMigrator {
        let retry = RetryExecutor::new(self.config.migration_retry.clone(), self.config.pacer())
            .with_classifier(Classifier::Forbidden);
        let files = self.drive().files().with_retry(Arc::new(retry));
        FolderMigrator::new(files, self.config.migration_workers)
    }

    /// Gets the configuration.
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Gets the request executor (for advanced use cases).
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Gets the standard retry executor.
    pub fn retry(&self) -> &Arc<RetryExecutor> {
        &self.retry
    }
}

/// Builder for WorkspaceClient.
pub struct WorkspaceClientBuilder {
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    config: Option<WorkspaceConfig>,
}

impl WorkspaceClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            transport: None,
            auth: None,
            config: None,
        }
    }

    /// Sets the HTTP transport every service is bound to.
    pub fn transport<T: HttpTransport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the HTTP transport from an Arc.
    pub fn transport_arc(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the authentication provider.
    pub fn auth_provider<A: AuthProvider + 'static>(mut self, provider: A) -> Self {
        self.auth = Some(Arc::new(provider));
        self
    }

    /// Sets the authentication provider from an Arc.
    pub fn auth_provider_arc(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: WorkspaceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the client.
    ///
    /// Fails with [`ConfigurationError::MissingTransport`] when no transport was set.
    pub fn build(self) -> WorkspaceResult<WorkspaceClient> {
        let transport = self.transport.ok_or(ConfigurationError::MissingTransport)?;
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => WorkspaceConfig::builder().build()?,
        };
        let config = Arc::new(config);

        let executor = Arc::new(RequestExecutor::new(config.clone(), transport, self.auth));
        let retry = Arc::new(RetryExecutor::new(config.retry.clone(), config.pacer()));

        Ok(WorkspaceClient {
            config,
            executor,
            retry,
            directory: OnceLock::new(),
            drive: OnceLock::new(),
            contacts: OnceLock::new(),
        })
    }
}

impl Default for WorkspaceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WorkspaceError;
    use crate::mocks::MockTransport;

    #[test]
    fn test_build_without_transport() {
        let result = WorkspaceClient::builder().build();
        assert!(matches!(
            result,
            Err(WorkspaceError::Configuration(ConfigurationError::MissingTransport))
        ));
    }

    #[test]
    fn test_services_are_memoized() {
        let client = WorkspaceClient::builder()
            .transport(MockTransport::new())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&client.directory(), &client.directory()));
        assert!(Arc::ptr_eq(&client.drive(), &client.drive()));
        assert!(Arc::ptr_eq(&client.contacts(), &client.contacts()));
        assert!(Arc::ptr_eq(
            &client.directory().users(),
            &client.directory().users()
        ));
        assert!(Arc::ptr_eq(
            &client.drive().files(),
            &client.drive().files()
        ));
    }

    #[test]
    fn test_migrator_uses_migration_policy() {
        let client = WorkspaceClient::builder()
            .transport(MockTransport::new())
            .build()
            .unwrap();
        let migrator = client.migrator();
        assert_eq!(migrator.workers(), client.config().migration_workers);
        assert_eq!(migrator.files().retry().policy().max_attempts(), 10);
    }
}
