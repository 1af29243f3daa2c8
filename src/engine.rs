//! Retrieval engine: batch scheduling, worker pool, and query orchestration.
//!
//! This module coordinates a full paginated retrieval run. One handshake
//! request learns the total item count and the remote quota; the planner and
//! quota guard decide whether multi-page work is needed and allowed; a pool
//! of workers then drains a shared queue of descriptor batches, recording
//! every page outcome in a [`FetchSession`] that restores page order at the
//! end.
//!
//! # Concurrency Model
//!
//! - The orchestrator fills a queue with batches of page descriptors
//! - `n_workers` tasks each pull one batch at a time and fan out one unit of
//!   work per descriptor, waiting for the whole batch before pulling the next
//! - Peak in-flight requests are bounded by `n_workers * batch_size`
//! - Workers share nothing but the queue and the fetch session
//!
//! # Example
//!
//! ```no_run
//! use pagefetch::{Engine, EngineConfig, HttpTransport, Query};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(Url::parse("https://api.example.com/v2/")?);
//! let engine = Engine::new(transport, EngineConfig::default())?;
//!
//! let query = Query::new().filter("country_code", "UK");
//! let items = engine.query("brands", query).await?;
//! println!("retrieved {} items", items.len());
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::batch::batched;
use crate::error::{ConfigError, FetchError};
use crate::planner::{check_quota, pages_needed};
use crate::query::Query;
use crate::retry::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, retry};
use crate::session::{ErrorPolicy, FetchSession};
use crate::transport::{ApiPayload, PageData, Transport};

/// Default number of workers pulling batches.
pub const DEFAULT_N_WORKERS: usize = 2;

/// Default number of page requests per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default page size for paged queries when the descriptor leaves it unset.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Tuning knobs for a retrieval engine.
///
/// # Default Values
///
/// - `n_workers`: 2
/// - `batch_size`: 10
/// - `retries`: 3
/// - `retry_delay`: 250ms
/// - `on_errors`: warn
/// - `per_page`: 100
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent workers pulling batches from the queue.
    pub n_workers: usize,
    /// Number of page requests fanned out per batch.
    pub batch_size: usize,
    /// Retries per request after the initial attempt.
    pub retries: u32,
    /// Fixed pause between retry attempts.
    pub retry_delay: Duration,
    /// Whether terminal page failures abort the run or only get recorded.
    pub on_errors: ErrorPolicy,
    /// Page size applied when a query does not set its own.
    pub per_page: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            n_workers: DEFAULT_N_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            on_errors: ErrorPolicy::Warn,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Client-side engine for retrieving complete result sets from a paginated,
/// rate-limited HTTP API.
///
/// The engine owns retrieval policy only: pagination planning, batching,
/// retry, quota enforcement, and result ordering. Issuing a single request is
/// delegated to the [`Transport`].
#[derive(Debug)]
pub struct Engine<T> {
    transport: Arc<T>,
    config: EngineConfig,
}

impl<T: Transport + 'static> Engine<T> {
    /// Creates an engine over `transport` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `n_workers`, `batch_size`, or `per_page`
    /// is zero.
    pub fn new(transport: T, config: EngineConfig) -> Result<Self, ConfigError> {
        if config.n_workers < 1 {
            return Err(ConfigError::InvalidWorkerCount {
                value: config.n_workers,
            });
        }
        if config.batch_size < 1 {
            return Err(ConfigError::InvalidBatchSize {
                value: config.batch_size,
            });
        }
        if config.per_page < 1 {
            return Err(ConfigError::InvalidPerPage {
                value: config.per_page,
            });
        }

        debug!(
            n_workers = config.n_workers,
            batch_size = config.batch_size,
            retries = config.retries,
            retry_delay_ms = config.retry_delay.as_millis(),
            "creating retrieval engine"
        );

        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Returns the engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Performs a fully paginated GET query on `endpoint`, returning all raw
    /// items in ascending page order.
    ///
    /// One handshake request determines the path:
    /// - an identifier-targeted query returns its single item
    /// - a query the handshake already satisfied returns those items directly
    /// - anything larger fans out over the worker pool, bounded by the
    ///   remote quota
    ///
    /// # Errors
    ///
    /// - [`FetchError::NoData`] if the handshake returns an empty result set
    /// - [`FetchError::RateLimitExceeded`] if the required pages exceed the
    ///   remaining quota (checked once, before any page is dispatched)
    /// - [`FetchError::PageFailed`] under the raise policy, naming the first
    ///   page whose retries were exhausted
    /// - Any transport error from the handshake that survives its retries
    #[instrument(skip(self, query))]
    pub async fn query(&self, endpoint: &str, query: Query) -> Result<Vec<Value>, FetchError> {
        let per_page = query.per_page_value().unwrap_or(self.config.per_page);

        // Probe with a single item per page unless the query is already
        // single-page; the handshake only needs `total` and the quota.
        let init_per_page = if query.is_single_page() { per_page } else { 1 };
        let handshake_query = query.with_page(None, Some(init_per_page), None);
        let response = retry(
            || self.transport.get(endpoint, &handshake_query),
            self.config.retries,
            self.config.retry_delay,
        )
        .await?;

        let payload = response.payload;
        if payload.data.is_empty() {
            return Err(FetchError::NoData);
        }

        let data_len = payload.data.len();
        let total = payload.meta.map(|m| m.total);

        // Identifier-targeted queries return one object, not a page.
        if matches!(payload.data, PageData::Item(_)) {
            debug!(endpoint, "single item retrieved");
            return Ok(payload.data.into_items());
        }

        // The handshake payload already covers the query.
        if query.is_single_page() || total == Some(data_len as u64) {
            debug!(endpoint, items = data_len, "query satisfied by single page");
            return Ok(payload.data.into_items());
        }

        let total = total.unwrap_or(data_len as u64);
        let n_pages = pages_needed(
            query.page_value(),
            per_page,
            query.max_pages_value(),
            total,
        );
        if n_pages <= 0 {
            debug!(endpoint, n_pages, "starting page beyond data, nothing to fetch");
            return Ok(Vec::new());
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n_pages = n_pages as u32;

        check_quota(u64::from(n_pages), response.quota)?;

        info!(endpoint, total, n_pages, per_page, "starting paged retrieval");

        let paged_query = query.with_page(None, Some(per_page), None);
        let pages = self.get_pages(endpoint, &paged_query, n_pages).await?;

        Ok(pages
            .into_iter()
            .flat_map(|payload| payload.data.into_items())
            .collect())
    }

    /// Fetches `n_pages` pages of `query` through the worker pool, returning
    /// page payloads in ascending page order.
    ///
    /// # Errors
    ///
    /// Under the raise policy, returns the first terminal page failure; under
    /// the warn policy failed pages are only logged and omitted.
    #[instrument(skip(self, query))]
    async fn get_pages(
        &self,
        endpoint: &str,
        query: &Query,
        n_pages: u32,
    ) -> Result<Vec<ApiPayload>, FetchError> {
        let queue: VecDeque<Vec<Query>> =
            batched(query.paginated(n_pages, None), self.config.batch_size).collect();
        let n_batches = queue.len();
        let queue = Arc::new(Mutex::new(queue));
        let session = Arc::new(FetchSession::new(self.config.on_errors));

        let workers: Vec<_> = (0..self.config.n_workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(WorkerContext {
                    worker_id,
                    transport: Arc::clone(&self.transport),
                    endpoint: endpoint.to_string(),
                    queue: Arc::clone(&queue),
                    session: Arc::clone(&session),
                    retries: self.config.retries,
                    retry_delay: self.config.retry_delay,
                }))
            })
            .collect();

        debug!(n_batches, workers = self.config.n_workers, "workers dispatched");

        let mut outcome = Ok(());
        for handle in join_all(workers).await {
            match handle {
                Ok(Ok(())) => {}
                // Keep the first failure; remaining workers already ran to
                // completion by the time join_all returns.
                Ok(Err(e)) if outcome.is_ok() => outcome = Err(e),
                Ok(Err(_)) => {}
                Err(e) => {
                    warn!(error = %e, "worker task panicked");
                }
            }
        }
        outcome?;

        let session = Arc::try_unwrap(session)
            .unwrap_or_else(|_| unreachable!("all workers joined before session drain"));
        session.warn_if_errors();
        Ok(session.into_results())
    }
}

/// Everything one worker needs, cloned per spawned task.
struct WorkerContext<T> {
    worker_id: usize,
    transport: Arc<T>,
    endpoint: String,
    queue: Arc<Mutex<VecDeque<Vec<Query>>>>,
    session: Arc<FetchSession<ApiPayload>>,
    retries: u32,
    retry_delay: Duration,
}

/// Worker loop: pull a batch, fan out one unit of work per descriptor, wait
/// for the whole batch, repeat until the queue is empty.
///
/// A raise-policy failure surfaces from the batch's join point and stops this
/// worker; sibling units already in flight within the batch run to completion
/// first (accepted behavior, not explicit cancellation).
async fn run_worker<T: Transport>(ctx: WorkerContext<T>) -> Result<(), FetchError> {
    loop {
        let Some(batch) = ctx.queue.lock().await.pop_front() else {
            debug!(worker_id = ctx.worker_id, "queue drained, worker stopping");
            return Ok(());
        };

        let units = batch.into_iter().map(|page_query| {
            let session = Arc::clone(&ctx.session);
            let transport = Arc::clone(&ctx.transport);
            let endpoint = ctx.endpoint.clone();
            let retries = ctx.retries;
            let delay = ctx.retry_delay;
            async move {
                // Descriptors derived by `paginated` always carry a page;
                // fall back to results-so-far + 1 for hand-built ones.
                #[allow(clippy::cast_possible_truncation)]
                let page = page_query
                    .page_value()
                    .unwrap_or_else(|| session.result_count() as u32 + 1);
                let fetch = retry(
                    || fetch_payload(&*transport, &endpoint, &page_query),
                    retries,
                    delay,
                );
                session.record(page, fetch).await
            }
        });

        for unit in join_all(units).await {
            unit?;
        }
    }
}

/// One retry attempt: a single transport request, stripped to its payload.
async fn fetch_payload<T: Transport>(
    transport: &T,
    endpoint: &str,
    query: &Query,
) -> Result<ApiPayload, FetchError> {
    let response = transport.get(endpoint, query).await?;
    Ok(response.payload)
}
