//! Mock transport and auth provider for testing.
//!
//! [`MockTransport`] either replays queued responses or delegates to a handler
//! closure, which lets tests build small stateful fakes of an API.

use crate::auth::{AccessToken, AuthProvider};
use crate::errors::{AuthenticationError, TransportError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// Create a response with a status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create an empty 200 response.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, Bytes::new())
    }

    /// Create a JSON response.
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header(CONTENT_TYPE, "application/json")
    }

    /// Create a 200 JSON response from a value.
    pub fn json_value(value: &serde_json::Value) -> Self {
        Self::json(StatusCode::OK, value.to_string())
    }

    /// Create an Atom XML response.
    pub fn xml(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header(CONTENT_TYPE, "application/atom+xml")
    }

    /// Create a plain text response.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header(CONTENT_TYPE, "text/plain")
    }

    /// Create a Google JSON error response.
    pub fn api_error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": message,
                "errors": [{ "message": message }]
            }
        });
        Self::json(status, body.to_string())
    }

    /// Add a header to the response.
    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }
}

enum Reply {
    Response(MockResponse),
    NetworkError(String),
}

type Handler = Box<dyn Fn(&HttpRequest) -> MockResponse + Send + Sync>;

/// Mock HTTP transport for testing.
pub struct MockTransport {
    /// Queue of replies to return.
    replies: Mutex<VecDeque<Reply>>,
    /// Recorded requests.
    requests: Mutex<Vec<HttpRequest>>,
    /// Default response if no replies are queued.
    default_response: Option<MockResponse>,
    /// Handler answering every request, if set.
    handler: Option<Handler>,
}

impl MockTransport {
    /// Create a new mock transport with no responses.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: None,
            handler: None,
        }
    }

    /// Create a mock transport with queued responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.push(response);
        }
        transport
    }

    /// Create a mock transport with a default response.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default_response: Some(response),
            ..Self::new()
        }
    }

    /// Create a mock transport answering every request with `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Queue a response to return.
    pub fn push(&self, response: MockResponse) {
        lock(&self.replies).push_back(Reply::Response(response));
    }

    /// Queue a network failure.
    pub fn push_network_error(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Reply::NetworkError(message.into()));
    }

    /// Get all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Get the last request made.
    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request.clone());

        let reply = match &self.handler {
            Some(handler) => Some(Reply::Response(handler(&request))),
            None => lock(&self.replies).pop_front(),
        };

        match reply.or_else(|| self.default_response.clone().map(Reply::Response)) {
            Some(Reply::Response(response)) => Ok(HttpResponse::new(
                response.status,
                response.headers,
                response.body,
            )),
            Some(Reply::NetworkError(message)) => Err(TransportError::Network(message)),
            None => Err(TransportError::Http(format!(
                "No mock response queued for {:?} {}",
                request.method, request.url
            ))),
        }
    }
}

/// Auth provider returning a fixed bearer token.
pub struct MockAuthProvider {
    token: String,
    calls: AtomicUsize,
}

impl MockAuthProvider {
    /// Create a provider for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of tokens handed out.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(
            self.token.clone(),
            "Bearer",
            Utc::now() + Duration::hours(1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpMethod;
    use url::Url;

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, Url::parse("https://example.com/a").unwrap())
    }

    #[tokio::test]
    async fn test_queued_then_default() {
        let transport = MockTransport::with_default(MockResponse::text(StatusCode::ACCEPTED, "d"));
        transport.push(MockResponse::ok());

        assert_eq!(transport.send(request()).await.unwrap().status, StatusCode::OK);
        assert_eq!(transport.send(request()).await.unwrap().status, StatusCode::ACCEPTED);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_network_error_and_empty_queue() {
        let transport = MockTransport::new();
        transport.push_network_error("reset");

        assert!(matches!(
            transport.send(request()).await,
            Err(TransportError::Network(_))
        ));
        assert!(matches!(
            transport.send(request()).await,
            Err(TransportError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_handler() {
        let transport = MockTransport::with_handler(|request| {
            MockResponse::text(StatusCode::OK, request.url.path().to_string())
        });
        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.body, Bytes::from("/a"));
    }
}
