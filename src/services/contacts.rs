//! Shared Contacts service over the legacy GData XML feed.
//!
//! Every request carries `GData-Version: 3.0`; updates and deletes send
//! `If-Match: *` so they apply regardless of the entry's ETag.

use crate::client::{encode_segment, RequestExecutor};
use crate::errors::{ErrorKey, WorkspaceError, WorkspaceResult};
use crate::pagination::{paginate, Page, PageStream};
use crate::resilience::RetryExecutor;
use crate::transport::HttpMethod;
use crate::types::contacts::{ContactEntry, ContactFeed};
use crate::xml;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, IF_MATCH};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Protocol version header name.
pub const GDATA_VERSION: &str = "GData-Version";

/// Page size of feed requests.
pub const FEED_PAGE_SIZE: u32 = 1000;

const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// Service for the Shared Contacts feed of a domain.
pub struct ContactsService {
    executor: Arc<RequestExecutor>,
    retry: Arc<RetryExecutor>,
}

impl ContactsService {
    /// Creates a new contacts service.
    pub(crate) fn new(executor: Arc<RequestExecutor>, retry: Arc<RetryExecutor>) -> Self {
        Self { executor, retry }
    }

    /// Returns the feed URL of a domain.
    pub fn feed_url(&self, domain: &str) -> WorkspaceResult<Url> {
        let url = self.executor.build_url(
            &self.executor.config().contacts_url,
            &format!("{}/full", encode_segment(domain)),
        )?;
        let page_size = FEED_PAGE_SIZE.to_string();
        self.executor
            .with_query(url, &[("v", "3.0"), ("max-results", page_size.as_str())])
    }

    /// Fetches the first page of a domain's feed.
    pub async fn list(&self, domain: &str) -> WorkspaceResult<ContactFeed> {
        let key = ErrorKey::new([domain]);
        let url = self.feed_url(domain).map_err(|e| e.with_key(&key))?;
        let executor = &self.executor;
        let url = &url;
        self.retry
            .run_value(&key, || fetch_feed(executor, url.clone()))
            .await
    }

    /// Streams every entry of a domain's feed, following `rel="next"` links.
    pub async fn stream(
        &self,
        domain: &str,
        buffer: usize,
        cancel: CancellationToken,
    ) -> WorkspaceResult<PageStream<ContactEntry>> {
        let key = ErrorKey::new([domain]);
        let first = self.feed_url(domain).map_err(|e| e.with_key(&key))?;
        let executor = self.executor.clone();

        let stream = paginate(self.retry.clone(), key, buffer, cancel, move |cursor| {
            let executor = executor.clone();
            let first = first.clone();
            async move {
                let url = match cursor {
                    Some(next) => parse_link(&next)?,
                    None => first,
                };
                let feed = fetch_feed(&executor, url).await?;
                let next = feed.next_link().map(str::to_string);
                Ok::<_, WorkspaceError>(Page::new(feed.entries, next))
            }
        })
        .await;

        Ok(stream)
    }

    /// Creates a contact in a domain.
    pub async fn create(&self, domain: &str, entry: &ContactEntry) -> WorkspaceResult<ContactEntry> {
        let key = entry_key(domain, entry);
        let url = self.feed_url(domain).map_err(|e| e.with_key(&key))?;
        let body = Bytes::from(xml::write_entry(entry).map_err(|e| e.with_key(&key))?);
        self.send_entry(&key, HttpMethod::Post, url, body, false).await
    }

    /// Gets a contact by its self link.
    pub async fn get(&self, self_link: &str) -> WorkspaceResult<ContactEntry> {
        let key = ErrorKey::new([self_link]);
        let url = parse_link(self_link).map_err(|e| e.with_key(&key))?;
        let executor = &self.executor;
        let url = &url;
        self.retry
            .run_value(&key, || async move {
                let body = executor
                    .execute_raw(HttpMethod::Get, url.clone(), gdata_headers(false), None)
                    .await?;
                xml::parse_entry(&String::from_utf8_lossy(&body))
            })
            .await
    }

    /// Replaces a contact, addressed by the entry's self link.
    pub async fn update(&self, entry: &ContactEntry) -> WorkspaceResult<ContactEntry> {
        let self_link = entry.self_link().unwrap_or_default();
        let key = ErrorKey::new([self_link]);
        if self_link.is_empty() {
            return Err(WorkspaceError::configuration("Contact entry has no self link").with_key(&key));
        }
        let url = parse_link(self_link).map_err(|e| e.with_key(&key))?;
        let body = Bytes::from(xml::write_entry(entry).map_err(|e| e.with_key(&key))?);
        self.send_entry(&key, HttpMethod::Put, url, body, true).await
    }

    /// Deletes a contact by its self link.
    pub async fn delete(&self, self_link: &str) -> WorkspaceResult<()> {
        let key = ErrorKey::new([self_link]);
        let url = parse_link(self_link).map_err(|e| e.with_key(&key))?;
        let executor = &self.executor;
        let url = &url;
        self.retry
            .run_action(&key, || async move {
                executor
                    .execute_raw(HttpMethod::Delete, url.clone(), gdata_headers(true), None)
                    .await
                    .map(|_| ())
            })
            .await
    }

    async fn send_entry(
        &self,
        key: &ErrorKey,
        method: HttpMethod,
        url: Url,
        body: Bytes,
        if_match: bool,
    ) -> WorkspaceResult<ContactEntry> {
        let executor = &self.executor;
        let url = &url;
        let body = &body;
        self.retry
            .run_value(key, || async move {
                let mut headers = gdata_headers(if_match);
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(ATOM_CONTENT_TYPE));
                let response = executor
                    .execute_raw(method, url.clone(), headers, Some(body.clone()))
                    .await?;
                xml::parse_entry(&String::from_utf8_lossy(&response))
            })
            .await
    }
}

fn gdata_headers(if_match: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("gdata-version"),
        HeaderValue::from_static("3.0"),
    );
    if if_match {
        headers.insert(IF_MATCH, HeaderValue::from_static("*"));
    }
    headers
}

fn entry_key(domain: &str, entry: &ContactEntry) -> ErrorKey {
    let mut key = ErrorKey::new([domain]);
    if let Some(email) = entry.primary_email() {
        key = key.push(email);
    }
    key
}

fn parse_link(link: &str) -> WorkspaceResult<Url> {
    Url::parse(link)
        .map_err(|e| WorkspaceError::configuration(format!("Invalid contact link {}: {}", link, e)))
}

async fn fetch_feed(executor: &RequestExecutor, url: Url) -> WorkspaceResult<ContactFeed> {
    let body = executor
        .execute_raw(HttpMethod::Get, url, gdata_headers(false), None)
        .await?;
    xml::parse_feed(&String::from_utf8_lossy(&body))
}
