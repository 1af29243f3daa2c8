//! Pagefetch
//!
//! A client-side engine for retrieving complete result sets from page-based
//! HTTP APIs that return data in bounded pages and enforce a remote
//! request-rate quota. Given one logical query, the engine determines how
//! many pages are needed, fetches them with bounded concurrency, tolerates
//! transient per-page failures via retry, respects the remote quota, and
//! reassembles an ordered, complete result set (or a well-defined partial
//! one).
//!
//! # Architecture
//!
//! The library is organized leaf to root:
//! - [`batch`] - lazy grouping of page descriptors into fixed-size batches
//! - [`retry`] - bounded fixed-delay retry around a single request
//! - [`session`] - per-run bookkeeping of page results and failures
//! - [`planner`] - page-count planning and the pre-dispatch quota guard
//! - [`query`] - immutable query descriptors and per-page derivation
//! - [`transport`] - the single-request seam ([`Transport`]) and its
//!   reqwest-backed implementation
//! - [`engine`] - the worker pool and the query orchestrator
//!
//! # Example
//!
//! ```no_run
//! use pagefetch::{Engine, EngineConfig, HttpTransport, Query};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = Url::parse("https://api.example.com/v2/")?;
//! let transport = HttpTransport::with_options(
//!     base,
//!     Some("TOKEN"),
//!     std::time::Duration::from_secs(5),
//! );
//! let engine = Engine::new(transport, EngineConfig::default())?;
//!
//! let items = engine
//!     .query("brands", Query::new().filter("name", "Swatch"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod engine;
pub mod error;
pub mod planner;
pub mod query;
pub mod retry;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use batch::{Batched, batched};
pub use engine::{
    DEFAULT_BATCH_SIZE, DEFAULT_N_WORKERS, DEFAULT_PER_PAGE, Engine, EngineConfig,
};
pub use error::{ConfigError, FetchError};
pub use planner::{RateQuota, check_quota, pages_needed};
pub use query::Query;
pub use retry::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, retry};
pub use session::{ErrorPolicy, FetchSession, PageError, PageResult};
pub use transport::{ApiPayload, HttpTransport, PageData, PageMeta, PageResponse, Transport};
