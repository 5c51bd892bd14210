//! Merging a fresh probe outcome into the previous status entry.

use chrono::{DateTime, Utc};

use super::StatusEntry;
use crate::probe::ProbeOutcome;

/// Width of a short-history bucket in seconds.
pub const BUCKET_SECONDS: i64 = 600;

/// Buckets kept in the short history (5 days).
pub const RETAINED_BUCKETS: i64 = 144 * 5;

/// The bucket range a run writes to and retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketWindow {
    pub current: i64,
    pub oldest: i64,
}

impl BucketWindow {
    pub fn at(now: DateTime<Utc>) -> Self {
        let current = now.timestamp().div_euclid(BUCKET_SECONDS);

        Self {
            current,
            oldest: current - RETAINED_BUCKETS,
        }
    }
}

/// Build this run's entry for one service.
///
/// A service seen for the first time is never a transition. A service that
/// stays down keeps the `failed_since` of the run where it first failed.
pub fn reconcile(
    previous: Option<&StatusEntry>,
    outcome: ProbeOutcome,
    window: BucketWindow,
    now: DateTime<Utc>,
) -> StatusEntry {
    let was_up = previous.map_or(false, StatusEntry::is_up);
    let is_up = outcome.succeeded();

    let mut historic = previous.map(|p| p.historic.clone()).unwrap_or_default();
    if !is_up {
        *historic.entry(window.current).or_insert(0) += 1;
    }
    historic.retain(|bucket, _| *bucket >= window.oldest);

    let failed_since = match previous {
        Some(p) if p.failed_since > 0 && outcome.failed_since > 0 => p.failed_since,
        _ => outcome.failed_since,
    };

    let mut history = previous.and_then(|p| p.history.clone()).unwrap_or_default();
    history.track_historic(is_up, now);

    StatusEntry {
        failed_since,
        kind: outcome.kind,
        error: outcome.error,
        historic,
        elapsed_ms: outcome.elapsed_ms,
        history: Some(history),
        is_transition: previous.is_some() && is_up != was_up,
    }
}
