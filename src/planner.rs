//! Page-count planning and the pre-dispatch rate-limit guard.
//!
//! Before any page work is dispatched, the orchestrator asks this module two
//! questions: how many pages does the query still need, and does the remote
//! quota reported by the handshake allow that many requests? Both answers are
//! computed exactly once per run; the quota is an optimistic snapshot, never
//! re-read mid-run.

use tracing::debug;

use crate::error::FetchError;

/// Remote request quota reported by the handshake response.
///
/// Parsed once from the `x-ratelimit-remaining` / `x-ratelimit-limit`
/// headers. Either field may be absent when the server does not advertise a
/// quota, in which case the guard is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateQuota {
    /// Requests remaining in the current quota window.
    pub remaining: Option<u64>,
    /// Total requests allowed per quota window.
    pub limit: Option<u64>,
}

/// Computes how many pages a query still needs to fetch.
///
/// The count is `ceil(total / per_page)` minus the pages skipped by a
/// starting page beyond 1, capped by `max_pages` when the cap is smaller.
///
/// The result can be zero or negative when the starting page lies beyond the
/// last page of data; callers treat anything `<= 0` as nothing left to fetch.
///
/// # Arguments
///
/// * `page` - Starting page; `None` means page 1
/// * `per_page` - Effective page size; zero is clamped to 1
/// * `max_pages` - Optional cap on the number of pages to fetch
/// * `total` - Total item count reported by the handshake
#[must_use]
pub fn pages_needed(page: Option<u32>, per_page: u32, max_pages: Option<u32>, total: u64) -> i64 {
    let per_page = u64::from(per_page.max(1));
    let skipped = i64::from(page.unwrap_or(1)) - 1;
    let total_pages = i64::try_from(total.div_ceil(per_page)).unwrap_or(i64::MAX) - skipped;

    match max_pages {
        Some(cap) if i64::from(cap) <= total_pages => i64::from(cap),
        _ => total_pages,
    }
}

/// Aborts a run whose page requirement exceeds the remaining remote quota.
///
/// Called exactly once, after the handshake and before any batch dispatch.
/// When the server did not report a remaining quota the check is skipped and
/// the run proceeds optimistically.
///
/// # Errors
///
/// Returns [`FetchError::RateLimitExceeded`] citing the computed requirement
/// and the reported remaining/total quota.
pub fn check_quota(required: u64, quota: RateQuota) -> Result<(), FetchError> {
    let Some(remaining) = quota.remaining else {
        debug!("no remaining-quota header reported, skipping rate-limit guard");
        return Ok(());
    };

    if required > remaining {
        return Err(FetchError::RateLimitExceeded {
            required,
            remaining,
            limit: quota.limit.unwrap_or(remaining),
        });
    }

    debug!(required, remaining, "page requirement within remote quota");
    Ok(())
}
