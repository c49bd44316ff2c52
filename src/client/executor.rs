//! Request executor with auth and error mapping.

use crate::auth::AuthProvider;
use crate::config::WorkspaceConfig;
use crate::errors::{ApiError, WorkspaceError, WorkspaceResult};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Characters escaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encodes a value for use as one URL path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Request executor that adds authentication, sends requests through the
/// transport, and maps error responses to [`ApiError`].
pub struct RequestExecutor {
    /// Configuration
    config: Arc<WorkspaceConfig>,
    /// HTTP transport
    transport: Arc<dyn HttpTransport>,
    /// Authentication provider; absent when the transport authenticates itself
    auth: Option<Arc<dyn AuthProvider>>,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        config: Arc<WorkspaceConfig>,
        transport: Arc<dyn HttpTransport>,
        auth: Option<Arc<dyn AuthProvider>>,
    ) -> Self {
        Self {
            config,
            transport,
            auth,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Joins a relative path onto a base URL.
    pub fn build_url(&self, base: &Url, path: &str) -> WorkspaceResult<Url> {
        base.join(path.trim_start_matches('/'))
            .map_err(|e| WorkspaceError::configuration(format!("Invalid URL {}: {}", path, e)))
    }

    /// Appends serialized query parameters to a URL.
    pub fn with_query<Q: Serialize + ?Sized>(&self, mut url: Url, query: &Q) -> WorkspaceResult<Url> {
        let encoded = serde_urlencoded::to_string(query).map_err(|e| {
            WorkspaceError::configuration(format!("Invalid query parameters: {}", e))
        })?;
        if !encoded.is_empty() {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
                _ => encoded,
            };
            url.set_query(Some(&merged));
        }
        Ok(url)
    }

    /// Serializes a JSON request body.
    pub fn json_body<B: Serialize + ?Sized>(body: &B) -> WorkspaceResult<Bytes> {
        serde_json::to_vec(body).map(Bytes::from).map_err(|e| {
            WorkspaceError::configuration(format!("Failed to serialize request body: {}", e))
        })
    }

    /// Executes a request and deserializes the JSON response.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<Bytes>,
    ) -> WorkspaceResult<T> {
        let mut headers = HeaderMap::new();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let response = self.execute_raw(method, url, headers, body).await?;

        serde_json::from_slice(&response).map_err(|e| {
            WorkspaceError::deserialization(format!("Failed to deserialize response: {}", e))
        })
    }

    /// Executes a request that returns no meaningful body.
    pub async fn execute_empty(&self, method: HttpMethod, url: Url) -> WorkspaceResult<()> {
        self.execute_raw(method, url, HeaderMap::new(), None)
            .await
            .map(|_| ())
    }

    /// Executes a request and returns the raw response body.
    ///
    /// `headers` are sent in addition to the authorization and user agent headers.
    pub async fn execute_raw(
        &self,
        method: HttpMethod,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> WorkspaceResult<Bytes> {
        let mut request = HttpRequest::new(method, url);
        request.timeout = Some(self.config.timeout);
        request.body = body;

        if let Some(auth) = &self.auth {
            let token = auth.get_access_token().await?;
            request.headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&token.authorization_header()).map_err(|e| {
                    WorkspaceError::configuration(format!("Invalid auth header: {}", e))
                })?,
            );
        }
        request.headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent).map_err(|e| {
                WorkspaceError::configuration(format!("Invalid user agent: {}", e))
            })?,
        );
        request.headers.extend(headers);

        debug!(method = ?request.method, url = %request.url, "Sending request");

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            return Err(handle_error_response(response));
        }

        Ok(response.body)
    }
}

/// Maps an error response to an [`ApiError`].
///
/// Google JSON error bodies supply the message and reason; any other body is
/// used verbatim as the message.
pub fn handle_error_response(response: HttpResponse) -> WorkspaceError {
    let status = response.status;

    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
        #[serde(default)]
        errors: Vec<ErrorItem>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorItem {
        reason: Option<String>,
    }

    let error = match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(parsed) => {
            let reason = parsed
                .error
                .errors
                .into_iter()
                .find_map(|item| item.reason);
            let error = ApiError::new(status.as_u16(), parsed.error.message);
            match reason {
                Some(reason) => error.with_reason(reason),
                None => error,
            }
        }
        Err(_) => {
            let body = String::from_utf8_lossy(&response.body).trim().to_string();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            };
            ApiError::new(status.as_u16(), message)
        }
    };

    WorkspaceError::Api(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockAuthProvider, MockResponse, MockTransport};
    use reqwest::StatusCode;

    fn executor(transport: Arc<MockTransport>) -> RequestExecutor {
        let config = WorkspaceConfig::builder().build().unwrap();
        RequestExecutor::new(
            Arc::new(config),
            transport,
            Some(Arc::new(MockAuthProvider::new("token-1"))),
        )
    }

    #[test]
    fn test_build_url_and_query() {
        let executor = executor(Arc::new(MockTransport::new()));
        let base = executor.config().directory_url.clone();

        let url = executor.build_url(&base, "/users").unwrap();
        assert_eq!(url.as_str(), "https://admin.googleapis.com/admin/directory/v1/users");

        let url = executor
            .with_query(url, &[("maxResults", "500"), ("query", "orgUnitPath='/A B'")])
            .unwrap();
        assert_eq!(url.query_pairs().count(), 2);
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "query").unwrap().1,
            "orgUnitPath='/A B'"
        );
    }

    #[test]
    fn test_with_query_keeps_existing() {
        let executor = executor(Arc::new(MockTransport::new()));
        let url = Url::parse("https://example.com/feed?v=3.0").unwrap();
        let url = executor.with_query(url, &[("max-results", "1000")]).unwrap();
        assert_eq!(url.query(), Some("v=3.0&max-results=1000"));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("user@example.com"), "user@example.com");
        assert_eq!(encode_segment("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_execute_json_sends_headers() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockResponse::json(StatusCode::OK, r#"{"id":"1"}"#));
        let executor = executor(transport.clone());

        let url = Url::parse("https://example.com/item").unwrap();
        let body = RequestExecutor::json_body(&serde_json::json!({"name": "x"})).unwrap();
        let value: serde_json::Value = executor
            .execute_json(HttpMethod::Post, url, Some(body))
            .await
            .unwrap();
        assert_eq!(value["id"], "1");

        let request = transport.last_request().unwrap();
        assert_eq!(request.headers[AUTHORIZATION], "Bearer token-1");
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(request.body_text().as_deref(), Some(r#"{"name":"x"}"#));
    }

    #[tokio::test]
    async fn test_google_error_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockResponse::json(
            StatusCode::FORBIDDEN,
            r#"{"error":{"code":403,"message":"User Rate Limit Exceeded","errors":[{"reason":"userRateLimitExceeded"}]}}"#,
        ));
        let executor = executor(transport);

        let url = Url::parse("https://example.com/item").unwrap();
        let error = executor
            .execute_json::<serde_json::Value>(HttpMethod::Get, url, None)
            .await
            .unwrap_err();

        assert!(error.is_retryable());
        assert_eq!(error.to_string(), "googleapi: Error 403: User Rate Limit Exceeded");
        match error {
            WorkspaceError::Api(api) => {
                assert_eq!(api.reason.as_deref(), Some("userRateLimitExceeded"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_error_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push(MockResponse::text(StatusCode::NOT_FOUND, ""));
        let executor = executor(transport);

        let url = Url::parse("https://example.com/item").unwrap();
        let error = executor.execute_empty(HttpMethod::Delete, url).await.unwrap_err();
        assert_eq!(error.to_string(), "googleapi: Error 404: Not Found");
    }
}
