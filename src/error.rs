//! Error types for the retrieval engine.
//!
//! This module defines structured errors for every stage of a paginated
//! retrieval run, providing context-rich messages for debugging and for
//! deciding whether a run aborted before or after page work began.

use thiserror::Error;

/// Errors that can occur during a paginated retrieval run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP response from the API.
    #[error("API error {status} requesting {url}: {message}")]
    Api {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Message extracted from the error payload, or a fallback.
        message: String,
    },

    /// Response body could not be decoded as the expected JSON shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The base URL and endpoint could not be combined into a request URL.
    #[error("invalid request URL: {url}")]
    InvalidUrl {
        /// The URL string that could not be built.
        url: String,
    },

    /// The handshake request returned an empty result set.
    ///
    /// Always fatal: no page work is attempted regardless of error policy.
    #[error("query returned no results")]
    NoData,

    /// The computed page requirement exceeds the remaining remote quota.
    ///
    /// Raised before any batch is dispatched, so no over-quota requests are
    /// ever issued.
    #[error(
        "required pages ({required}) for this query exceed the rate limit \
         (remaining={remaining}, total={limit})"
    )]
    RateLimitExceeded {
        /// Number of pages the planner computed for this query.
        required: u64,
        /// Requests remaining in the remote quota window.
        remaining: u64,
        /// Total requests allowed per quota window.
        limit: u64,
    },

    /// A page request failed terminally under the raise policy.
    ///
    /// Identifies the first page whose retries were exhausted. The full
    /// failure record stays in the fetch session's error list.
    #[error("page {page} failed: {message}")]
    PageFailed {
        /// The page number that failed.
        page: u32,
        /// Rendered description of the terminal failure.
        message: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an API status error.
    pub fn api(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a decode error from a reqwest body error.
    pub fn decode(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a terminal page failure from the failure it records.
    pub fn page_failed(page: u32, error: &FetchError) -> Self {
        Self::PageFailed {
            page,
            message: error.to_string(),
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` because our error
// variants require context (the request URL) that the source error does not
// reliably provide. The helper constructor methods are the pattern here.

/// Errors raised when constructing an engine from invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Worker count must be at least one.
    #[error("invalid worker count {value}: must be at least 1")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Batch size must be at least one.
    #[error("invalid batch size {value}: must be at least 1")]
    InvalidBatchSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Default page size must be at least one.
    #[error("invalid page size {value}: must be at least 1")]
    InvalidPerPage {
        /// The invalid value that was provided.
        value: u32,
    },
}
