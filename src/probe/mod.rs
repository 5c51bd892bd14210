//! Probe module for service monitoring.
//!
//! Supports HTTP and MySQL probes, both built from definition files.

mod definition;
mod http;
mod mysql;

pub use definition::*;
pub use http::*;
pub use mysql::*;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("Status code was {0} instead of 200")]
    Status(u16),
}

/// Tag identifying which probe type produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Http,
    Mysql,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Http => f.write_str("http"),
            ProbeKind::Mysql => f.write_str("mysql"),
        }
    }
}

/// Result of one probe execution for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub kind: ProbeKind,
    /// Empty iff the probe succeeded.
    pub error: String,
    pub elapsed_ms: u64,
    /// Unix seconds at which the failure was observed, 0 while up.
    pub failed_since: i64,
}

impl ProbeOutcome {
    pub fn up(kind: ProbeKind, elapsed_ms: u64) -> Self {
        Self {
            kind,
            error: String::new(),
            elapsed_ms,
            failed_since: 0,
        }
    }

    pub fn down(kind: ProbeKind, error: impl Into<String>, elapsed_ms: u64, failed_since: i64) -> Self {
        Self {
            kind,
            error: error.into(),
            elapsed_ms,
            failed_since,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_empty()
    }
}

/// Timing and retry settings shared by every probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// A unit of work that checks one service.
///
/// Implementations apply their own timeout and retry policy; callers treat
/// `resolve` as a single call whose failures are already encoded in the
/// returned outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    async fn resolve(&self) -> ProbeOutcome;
}

/// Run `attempt`, and on failure run it exactly once more after `retry_delay`.
///
/// The elapsed time of the final attempt is recorded in the outcome.
pub async fn resolve_with_retry<F, Fut>(kind: ProbeKind, retry_delay: Duration, mut attempt: F) -> ProbeOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ProbeError>>,
{
    let (result, elapsed_ms) = timed(attempt()).await;

    let (result, elapsed_ms) = match result {
        Ok(()) => return ProbeOutcome::up(kind, elapsed_ms),
        Err(e) => {
            tracing::debug!("{} probe failed, retrying in {:?}: {}", kind, retry_delay, e);
            tokio::time::sleep(retry_delay).await;
            timed(attempt()).await
        }
    };

    match result {
        Ok(()) => ProbeOutcome::up(kind, elapsed_ms),
        Err(e) => ProbeOutcome::down(kind, e.to_string(), elapsed_ms, Utc::now().timestamp()),
    }
}

async fn timed<Fut>(fut: Fut) -> (Result<(), ProbeError>, u64)
where
    Fut: Future<Output = Result<(), ProbeError>>,
{
    let start = Instant::now();
    let result = fut.await;
    (result, start.elapsed().as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_recovers_on_second_attempt() {
        let calls = AtomicUsize::new(0);

        let outcome = resolve_with_retry(ProbeKind::Http, Duration::ZERO, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ProbeError::Network("connection reset".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.failed_since, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_happens_exactly_once() {
        let calls = AtomicUsize::new(0);
        let before = Utc::now().timestamp();

        let outcome = resolve_with_retry(ProbeKind::Mysql, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProbeError::Status(503)) }
        })
        .await;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.error, "Status code was 503 instead of 200");
        assert_eq!(outcome.kind, ProbeKind::Mysql);
        assert!(outcome.failed_since >= before);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_success_skips_retry() {
        let calls = AtomicUsize::new(0);

        let outcome = resolve_with_retry(ProbeKind::Http, Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(outcome.succeeded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_probe_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProbeKind::Http).unwrap(), "\"http\"");
        assert_eq!(serde_json::to_string(&ProbeKind::Mysql).unwrap(), "\"mysql\"");
    }
}
