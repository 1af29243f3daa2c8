//! Transport boundary: how the engine talks to the remote API.
//!
//! The engine never builds HTTP requests itself; it consumes the [`Transport`]
//! trait, which issues one GET for one query descriptor and returns the parsed
//! page payload together with the quota snapshot from the response headers.
//! [`HttpTransport`] is the reqwest-backed implementation; tests substitute
//! their own to drive the engine without a network.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::planner::RateQuota;
use crate::query::Query;

/// Default per-request timeout (5 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("pagefetch/", env!("CARGO_PKG_VERSION"));

/// Response header carrying the remaining request quota.
const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Response header carrying the total request quota per window.
const RATELIMIT_LIMIT: &str = "x-ratelimit-limit";

/// Fallback message when an error body carries no `message` field.
const DEFAULT_ERROR_MESSAGE: &str = "an error occurred with the API";

/// The `data` portion of a page payload.
///
/// The API returns a JSON array for paginated collection queries and a single
/// JSON object for identifier-targeted queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageData {
    /// One page of collection items.
    Items(Vec<Value>),
    /// A single identifier-targeted item.
    Item(serde_json::Map<String, Value>),
}

impl PageData {
    /// Whether the payload holds no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Items(items) => items.is_empty(),
            Self::Item(item) => item.is_empty(),
        }
    }

    /// Number of items in the payload (a single object counts as one).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Items(items) => items.len(),
            Self::Item(_) => 1,
        }
    }

    /// Flattens the payload into a list of raw items.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Self::Items(items) => items,
            Self::Item(item) => vec![Value::Object(item)],
        }
    }
}

/// Pagination metadata reported alongside a page.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageMeta {
    /// Total number of items matching the query across all pages.
    pub total: u64,
}

/// Parsed body of one API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPayload {
    /// The page's data.
    pub data: PageData,
    /// Pagination metadata; absent for identifier-targeted responses.
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

/// One page response: parsed payload plus the quota snapshot from headers.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// The parsed response body.
    pub payload: ApiPayload,
    /// Remote quota state at the time of this response.
    pub quota: RateQuota,
}

/// Issues one GET request for one query descriptor.
///
/// Implementations own per-request concerns (authentication headers,
/// timeouts, TLS); the engine owns everything above a single request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a GET request on `endpoint` for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Api`] for non-success statuses,
    /// [`FetchError::Network`] for connection-level failures, and
    /// [`FetchError::Decode`] when the body is not the expected shape.
    async fn get(&self, endpoint: &str, query: &Query) -> Result<PageResponse, FetchError>;
}

/// Reqwest-backed [`Transport`] for JSON APIs.
///
/// Designed to be created once and shared across a run, taking advantage of
/// connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Skip the client: its Debug output is noisy and may echo headers.
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport for `base_url` with the default timeout and no
    /// authentication.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(base_url: Url) -> Self {
        Self::with_options(base_url, None, DEFAULT_TIMEOUT)
    }

    /// Creates a transport with a bearer token and explicit timeout.
    ///
    /// # Panics
    ///
    /// Panics if the bearer token contains characters invalid in an HTTP
    /// header, or if the HTTP client builder fails to build.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_options(base_url: Url, auth_token: Option<&str>, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .expect("auth token contains invalid header characters");
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = ClientBuilder::new()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");

        Self { client, base_url }
    }

    /// Builds the request URL for an endpoint, appending the item identifier
    /// as a path segment when the query targets a single item.
    fn request_url(&self, endpoint: &str, query: &Query) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| FetchError::invalid_url(self.base_url.as_str()))?;
            segments.pop_if_empty();
            segments.extend(endpoint.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = query.item_id_value() {
                segments.push(&id.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, query), fields(base_url = %self.base_url))]
    async fn get(&self, endpoint: &str, query: &Query) -> Result<PageResponse, FetchError> {
        let url = self.request_url(endpoint, query)?;
        let params = query.to_params(endpoint);

        let response = self
            .client
            .get(url.clone())
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), e))?;

        let status = response.status();
        let quota = quota_from_headers(response.headers());

        if status != StatusCode::OK {
            let message = error_message(response).await;
            return Err(FetchError::api(url.as_str(), status.as_u16(), message));
        }

        debug!(
            url = %url,
            page = query.page_value(),
            quota_remaining = quota.remaining,
            "page retrieved"
        );

        let payload: ApiPayload = response
            .json()
            .await
            .map_err(|e| FetchError::decode(url.as_str(), e))?;

        Ok(PageResponse { payload, quota })
    }
}

/// Reads the quota snapshot from response headers.
///
/// Missing or unparseable headers yield `None` fields; the guard treats those
/// as "no quota advertised".
#[must_use]
pub fn quota_from_headers(headers: &HeaderMap) -> RateQuota {
    let parse = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
    };

    RateQuota {
        remaining: parse(RATELIMIT_REMAINING),
        limit: parse(RATELIMIT_LIMIT),
    }
}

/// Extracts the `message` field from an error body, with a fallback when the
/// body is not JSON or has no message.
async fn error_message(response: reqwest::Response) -> String {
    match response.json::<Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_string(),
        Err(_) => DEFAULT_ERROR_MESSAGE.to_string(),
    }
}
