//! Authentication seam.
//!
//! Token acquisition (OAuth consent, service account delegation) happens outside
//! this crate. Callers either inject a transport that already authenticates its
//! requests, or an [`AuthProvider`] whose token is attached as a bearer header.

use crate::errors::AuthenticationError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

/// Token expiry buffer (5 minutes).
pub const TOKEN_EXPIRY_BUFFER_SECONDS: i64 = 300;

/// OAuth 2.0 scopes used by the core.
pub mod scopes {
    /// Admin SDK Directory, users.
    pub const ADMIN_DIRECTORY_USER: &str =
        "https://www.googleapis.com/auth/admin.directory.user";

    /// Admin SDK Directory, group memberships.
    pub const ADMIN_DIRECTORY_GROUP_MEMBER: &str =
        "https://www.googleapis.com/auth/admin.directory.group.member";

    /// Full access to Drive files.
    pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";

    /// Domain shared contacts feed.
    pub const SHARED_CONTACTS: &str = "https://www.google.com/m8/feeds/contacts/";
}

/// Authentication provider abstraction.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get an access token for API requests.
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError>;
}

/// Access token with metadata.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token string.
    pub token: SecretString,

    /// Token type (usually "Bearer").
    pub token_type: String,

    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Creates a new access token.
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: SecretString::new(token.into()),
            token_type: token_type.into(),
            expires_at,
        }
    }

    /// Checks if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Checks if the token is within the refresh buffer of its expiry.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(TOKEN_EXPIRY_BUFFER_SECONDS) >= self.expires_at
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token.expose_secret())
    }
}

/// Provider for a token issued out of band.
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    /// Creates a provider for a bearer token valid until `expires_at`.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: AccessToken::new(token, "Bearer", expires_at),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError> {
        if self.token.is_expired() {
            return Err(AuthenticationError::ExpiredToken(format!(
                "token expired at {}",
                self.token.expires_at
            )));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new("abc", Utc::now() + Duration::hours(1));
        let token = provider.get_access_token().await.unwrap();
        assert_eq!(token.authorization_header(), "Bearer abc");
        assert!(!token.needs_refresh());
    }

    #[tokio::test]
    async fn test_static_token_provider_expired() {
        let provider = StaticTokenProvider::new("abc", Utc::now() - Duration::seconds(1));
        let result = provider.get_access_token().await;
        assert!(matches!(result, Err(AuthenticationError::ExpiredToken(_))));
    }
}
