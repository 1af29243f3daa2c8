//! Per-run bookkeeping of page outcomes.
//!
//! This module provides the [`FetchSession`], the single point of
//! synchronization between concurrently-scheduled page requests. Workers
//! record each page's outcome here as it completes (in arbitrary order); once
//! all workers have joined, the orchestrator drains the session and gets
//! results back in ascending page order.
//!
//! Outcomes are kept as `Result`-like record pairs: a [`PageResult`] for a
//! page that was retrieved, a [`PageError`] for a page whose retries were
//! exhausted. Recording never loses a terminal failure; whether it also
//! propagates to the caller depends on the session's [`ErrorPolicy`].

use std::future::Future;
use std::sync::Mutex;

use tracing::warn;

use crate::error::FetchError;

/// What to do when a page request fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the failure and keep going; the run yields the pages that
    /// succeeded plus one warning event naming the pages that did not.
    #[default]
    Warn,

    /// Record the failure and re-raise it immediately, aborting the run with
    /// no partial result.
    Raise,
}

/// A successfully retrieved page: page number paired with its payload.
#[derive(Debug)]
pub struct PageResult<T> {
    /// The page number that succeeded.
    pub page: u32,
    /// The payload retrieved for that page.
    pub value: T,
}

/// A terminally failed page: page number paired with the captured failure.
#[derive(Debug)]
pub struct PageError {
    /// The page number that failed.
    pub page: u32,
    /// The failure that survived the retry budget.
    pub error: FetchError,
}

/// Append-only state behind the session mutex.
#[derive(Debug)]
struct SessionState<T> {
    results: Vec<PageResult<T>>,
    errors: Vec<PageError>,
}

/// Accumulates per-page outcomes for one retrieval run.
///
/// Created fresh per orchestration call and consumed once all workers join.
/// Appends from concurrent units of work are serialized by an internal mutex;
/// the lock is only ever held for a push, never across an await point.
#[derive(Debug)]
pub struct FetchSession<T> {
    policy: ErrorPolicy,
    state: Mutex<SessionState<T>>,
}

impl<T> FetchSession<T> {
    /// Creates an empty session with the given failure policy.
    #[must_use]
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(SessionState {
                results: Vec::new(),
                errors: Vec::new(),
            }),
        }
    }

    /// Executes `op` for `page` and records its outcome.
    ///
    /// On success the payload is appended to the result list. On failure the
    /// error is appended to the error list; under [`ErrorPolicy::Raise`] a
    /// [`FetchError::PageFailed`] identifying the page is additionally
    /// returned so the batch's join point observes it. Under
    /// [`ErrorPolicy::Warn`] failures never cross this boundary.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::PageFailed`] only under the raise policy.
    pub async fn record<Fut>(&self, page: u32, op: Fut) -> Result<(), FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match op.await {
            Ok(value) => {
                self.lock_state().results.push(PageResult { page, value });
                Ok(())
            }
            Err(error) => {
                let raised = match self.policy {
                    ErrorPolicy::Raise => Err(FetchError::page_failed(page, &error)),
                    ErrorPolicy::Warn => Ok(()),
                };
                self.lock_state().errors.push(PageError { page, error });
                raised
            }
        }
    }

    /// Number of results recorded so far.
    ///
    /// Used to derive a fallback page number for descriptors without an
    /// explicit page (results-so-far + 1).
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.lock_state().results.len()
    }

    /// Consumes the session, returning recorded payloads sorted ascending by
    /// page number; page numbers are dropped.
    #[must_use]
    pub fn into_results(self) -> Vec<T> {
        let state = self.state.into_inner().unwrap_or_else(|e| e.into_inner());
        let mut results = state.results;
        results.sort_by_key(|r| r.page);
        results.into_iter().map(|r| r.value).collect()
    }

    /// Consumes the session, returning recorded failures sorted ascending by
    /// page number.
    #[must_use]
    pub fn into_errors(self) -> Vec<PageError> {
        let state = self.state.into_inner().unwrap_or_else(|e| e.into_inner());
        let mut errors = state.errors;
        errors.sort_by_key(|e| e.page);
        errors
    }

    /// Page numbers of recorded failures, sorted ascending.
    #[must_use]
    pub fn error_pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.lock_state().errors.iter().map(|e| e.page).collect();
        pages.sort_unstable();
        pages
    }

    /// Emits a single warning event naming the failed pages, if any.
    pub fn warn_if_errors(&self) {
        let state = self.lock_state();
        if state.errors.is_empty() {
            return;
        }

        let mut failed: Vec<(u32, String)> = state
            .errors
            .iter()
            .map(|e| (e.page, e.error.to_string()))
            .collect();
        failed.sort_by_key(|(page, _)| *page);

        let pages: Vec<u32> = failed.iter().map(|(page, _)| *page).collect();
        warn!(failed_pages = ?pages, failures = ?failed, "could not get pages");
    }

    /// Locks the state, recovering from a poisoned mutex.
    ///
    /// A panic inside the lock can only happen while pushing to a Vec; the
    /// lists stay well-formed, so the poison flag carries no information.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    fn api_err(status: u16) -> FetchError {
        FetchError::api("http://example.com/things", status, "boom")
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        /// Runs `f` with a subscriber writing into this capture.
        fn record_events(&self, f: impl FnOnce()) {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_ansi(false)
                .without_time()
                .finish();
            tracing::subscriber::with_default(subscriber, f);
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    // ==================== Recording Tests ====================

    #[tokio::test]
    async fn test_record_success_appends_result() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        session.record(1, async { Ok(10) }).await.unwrap();
        session.record(2, async { Ok(20) }).await.unwrap();

        assert_eq!(session.result_count(), 2);
        assert_eq!(session.into_results(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_record_failure_warn_policy_is_silent() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        let outcome = session.record(3, async { Err(api_err(500)) }).await;

        assert!(outcome.is_ok(), "warn policy must not propagate failures");
        assert_eq!(session.error_pages(), vec![3]);
        let errors = session.into_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].error, FetchError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_record_failure_raise_policy_propagates() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Raise);
        let outcome = session.record(3, async { Err(api_err(500)) }).await;

        match outcome {
            Err(FetchError::PageFailed { page, message }) => {
                assert_eq!(page, 3);
                assert!(message.contains("500"), "Expected status in: {message}");
            }
            other => panic!("expected PageFailed, got {other:?}"),
        }
        // The failure is recorded as well as raised.
        assert_eq!(session.error_pages(), vec![3]);
    }

    // ==================== Ordering Tests ====================

    #[tokio::test]
    async fn test_results_sorted_by_page_regardless_of_arrival() {
        let session: FetchSession<&str> = FetchSession::new(ErrorPolicy::Warn);
        for (page, value) in [(5, "e"), (1, "a"), (3, "c"), (2, "b"), (4, "d")] {
            session.record(page, async { Ok(value) }).await.unwrap();
        }

        assert_eq!(session.into_results(), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_errors_sorted_by_page() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        for page in [9, 2, 6] {
            session.record(page, async { Err(api_err(503)) }).await.unwrap();
        }

        assert_eq!(session.error_pages(), vec![2, 6, 9]);
        let pages: Vec<u32> = session.into_errors().iter().map(|e| e.page).collect();
        assert_eq!(pages, vec![2, 6, 9]);
    }

    // ==================== Mixed Outcome Tests ====================

    #[tokio::test]
    async fn test_partial_success_under_warn_policy() {
        // Two of five pages fail: three results, two error records.
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        for page in 1..=5u32 {
            let outcome = if page == 2 || page == 4 {
                session.record(page, async { Err(api_err(500)) }).await
            } else {
                session.record(page, async { Ok(page * 10) }).await
            };
            assert!(outcome.is_ok());
        }

        assert_eq!(session.error_pages(), vec![2, 4]);
        session.warn_if_errors();
        assert_eq!(session.into_results(), vec![10, 30, 50]);
    }

    #[tokio::test]
    async fn test_warn_if_errors_emits_one_event_naming_failed_pages() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        session.record(1, async { Ok(10) }).await.unwrap();
        session.record(4, async { Err(api_err(500)) }).await.unwrap();
        session.record(2, async { Err(api_err(503)) }).await.unwrap();

        let capture = LogCapture::default();
        capture.record_events(|| session.warn_if_errors());

        let output = capture.contents();
        assert!(output.contains("WARN"), "got: {output}");
        assert!(output.contains("could not get pages"), "got: {output}");
        // Failed page numbers appear once, sorted.
        assert!(output.contains("failed_pages=[2, 4]"), "got: {output}");
        assert_eq!(output.lines().count(), 1, "got: {output}");
    }

    #[tokio::test]
    async fn test_warn_if_errors_noop_when_clean() {
        let session: FetchSession<u32> = FetchSession::new(ErrorPolicy::Warn);
        session.record(1, async { Ok(1) }).await.unwrap();

        let capture = LogCapture::default();
        capture.record_events(|| session.warn_if_errors());
        assert!(capture.contents().is_empty(), "got: {}", capture.contents());
    }

    // ==================== Concurrency Tests ====================

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        use std::sync::Arc;

        let session: Arc<FetchSession<u32>> = Arc::new(FetchSession::new(ErrorPolicy::Warn));
        let mut handles = Vec::new();
        for page in 1..=50u32 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session.record(page, async { Ok(page) }).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let session = Arc::try_unwrap(session).unwrap();
        let results = session.into_results();
        assert_eq!(results, (1..=50).collect::<Vec<u32>>());
    }
}
