//! Blocking HTTP transports over the Diigo endpoints.

use super::records::{Bookmark, FeedPage};
use super::url::DiigoUrls;
use super::{Cursor, Transport, TransportMode};
use crate::error::{SyncError, SyncResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Build the HTTP client shared by transports, downloads and link probes.
pub fn build_http_client(timeout_seconds: u64) -> SyncResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .connect_timeout(Duration::from_secs(timeout_seconds))
        .user_agent(format!("diigo-sync/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| SyncError::internal(format!("failed to construct HTTP client: {err}")))
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Send a request and decode its JSON body. Any failure is a transport failure.
fn get_json<T: DeserializeOwned>(url: &str, request: RequestBuilder) -> SyncResult<T> {
    let response: Response = request
        .send()
        .map_err(|err| SyncError::transport(url, format!("network request failed: {err}")))?;
    let status = response.status();
    let body = response.text().unwrap_or_default();

    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or("");
        let err = SyncError::transport(url, format!("{} {}", status.as_u16(), reason).trim_end());
        let body = body.trim();
        return Err(if body.is_empty() {
            err
        } else {
            err.with_details(truncate_for_error(body, 240))
        });
    }

    serde_json::from_str(&body).map_err(|err| {
        SyncError::transport(url, format!("failed to decode response JSON: {err}"))
    })
}

/// Paged API transport (basic auth + API key).
#[derive(Debug, Clone)]
pub struct ApiTransport {
    client: Client,
    urls: DiigoUrls,
    login: String,
    password: String,
    query: Option<String>,
}

impl ApiTransport {
    pub fn new(client: Client, urls: DiigoUrls, login: &str, password: &str) -> Self {
        Self {
            client,
            urls,
            login: login.to_string(),
            password: password.to_string(),
            query: None,
        }
    }

    /// Restrict the listing with a free-text filter.
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    fn url_for(&self, start: u64, count: u64) -> String {
        let mut params = vec![
            ("start", start.to_string()),
            ("count", count.to_string()),
            // created_at order, so an interrupted import can resume by offset
            ("sort", "0".to_string()),
        ];
        if let Some(query) = &self.query {
            params.push(("what", query.clone()));
        }
        self.urls.items(&params)
    }

    /// Check that the credentials and key grant access to the library.
    pub fn verify(&self) -> SyncResult<()> {
        let url = self.urls.items(&[("start", "0".to_string()), ("count", "1".to_string())]);
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.login, Some(&self.password));
        let _: Vec<serde_json::Value> = get_json(&url, request)?;
        info!("Diigo API credentials verified");
        Ok(())
    }
}

impl Transport for ApiTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Api
    }

    fn fetch_page(&self, cursor: &Cursor) -> SyncResult<Vec<Bookmark>> {
        let (start, count) = match *cursor {
            Cursor::Paged { start, count } => (start, count),
            Cursor::Feed { page_num } => (page_num, 100),
        };
        let url = self.url_for(start, count);
        debug!(start, count, "fetching API page");
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.login, Some(&self.password));
        get_json(&url, request)
    }
}

/// Outliner feed transport (session cookie).
#[derive(Debug, Clone)]
pub struct FeedTransport {
    client: Client,
    urls: DiigoUrls,
    session_cookie: String,
    query: Option<String>,
}

impl FeedTransport {
    pub fn new(client: Client, urls: DiigoUrls, session_cookie: &str) -> Self {
        Self {
            client,
            urls,
            session_cookie: session_cookie.to_string(),
            query: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    fn url_for(&self, page_num: u64) -> String {
        let mut params = vec![
            ("page_num", page_num.to_string()),
            ("type", "all".to_string()),
            ("sort", "updated".to_string()),
        ];
        if let Some(query) = &self.query {
            params.push(("what", query.clone()));
        }
        self.urls.feed_items(&params)
    }
}

impl Transport for FeedTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Feed
    }

    fn fetch_page(&self, cursor: &Cursor) -> SyncResult<Vec<Bookmark>> {
        let page_num = match *cursor {
            Cursor::Feed { page_num } => page_num,
            Cursor::Paged { start, count } => start / count.max(1),
        };
        let url = self.url_for(page_num);
        debug!(page_num, "fetching feed page");
        let request = self
            .client
            .get(&url)
            .header(COOKIE, self.session_cookie.as_str());
        let page: FeedPage = get_json(&url, request)?;
        Ok(page.items)
    }
}
