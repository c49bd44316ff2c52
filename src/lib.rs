//! Google Workspace Administration Client Core
//!
//! Typed building blocks for bulk administration of a Google Workspace
//! domain over the Admin SDK Directory, Drive v3 and the Shared Contacts feed.
//!
//! # Features
//!
//! - **Retry**: quota and rate 403s retried with exponential backoff, every
//!   failure attributed to its call site
//! - **Streaming pagination**: list calls drained on background tasks onto
//!   bounded channels
//! - **Unique users**: deduplicated users of organizational units and groups
//! - **Batch CSV**: typed flags resolved per CSV row, with `_ALL` variants
//! - **Folder migration**: clone a Drive folder tree and reparent its files
//! - **Shared Contacts**: GData Atom XML feed read and write
//! - **Profiles**: named credential profiles in a YAML file
//!
//! # Example
//!
//! ```no_run
//! use google_workspace::{ReqwestTransport, WorkspaceClient, WorkspaceConfig};
//! use google_workspace::auth::StaticTokenProvider;
//! use chrono::{Duration, Utc};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkspaceConfig::builder().build()?;
//! let transport = ReqwestTransport::from_config(&config)?;
//!
//! let client = WorkspaceClient::builder()
//!     .transport(transport)
//!     .auth_provider(StaticTokenProvider::new("ya29.token", Utc::now() + Duration::hours(1)))
//!     .config(config)
//!     .build()?;
//!
//! let mut users = client
//!     .directory()
//!     .users()
//!     .stream_org_unit_emails("/Sales", 100, CancellationToken::new())
//!     .await;
//! while let Some(email) = users.next().await {
//!     println!("{}", email);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

// Core modules
pub mod aggregate;
pub mod auth;
pub mod batch;
pub mod client;
pub mod config;
pub mod errors;
pub mod migration;
pub mod pagination;
pub mod resilience;
pub mod schema;
pub mod services;
pub mod transport;
pub mod types;
pub mod xml;

// Test doubles for transports and auth
pub mod mocks;

// Re-exports for convenience
pub use auth::{AccessToken, AuthProvider, StaticTokenProvider};
pub use client::{WorkspaceClient, WorkspaceClientBuilder};
pub use config::{WorkspaceConfig, WorkspaceConfigBuilder};
pub use errors::{ErrorKey, WorkspaceError, WorkspaceResult};
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::{ContactEntry, DriveFile, Member, User};

/// Prelude module with commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits from the library,
/// making it convenient to use with a single import:
///
/// ```no_run
/// use google_workspace::prelude::*;
/// ```
pub mod prelude {
    // Client
    pub use crate::client::WorkspaceClient;

    // Configuration
    pub use crate::config::{WorkspaceConfig, WorkspaceConfigBuilder};

    // Authentication
    pub use crate::auth::{AccessToken, AuthProvider, StaticTokenProvider};

    // Services
    pub use crate::services::{
        ContactsService, DirectoryService, DriveService, FilesService, MembersService,
        UsersService,
    };

    // Common types
    pub use crate::types::{ContactEntry, ContactFeed, DriveFile, FileList, Member, User};

    // Core drivers
    pub use crate::aggregate::{AggregateOptions, UniqueUsers, UserSource};
    pub use crate::batch::{BatchDriver, BatchOptions, BatchStream};
    pub use crate::migration::{FolderMigrator, MigrationReport};
    pub use crate::schema::{CommandSchema, FlagSpec, FlagType, Invocation, ParameterMap};

    // Errors
    pub use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};

    // Retry and pagination
    pub use crate::pagination::{Page, PageIterator, PageStream};
    pub use crate::resilience::{RetryExecutor, RetryPolicy};
}
