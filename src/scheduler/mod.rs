//! Scheduler module for running one round of probes.

use crate::probe::{ProbeOutcome, ProbeSet};
use crate::status::{reconcile, BucketWindow, Snapshot, StatusEntry, Summary};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// The merged snapshot and totals of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: Snapshot,
    pub summary: Summary,
}

/// Runs every configured probe once and merges the results.
pub struct Scheduler {
    probes: ProbeSet,
}

impl Scheduler {
    /// Create a new scheduler for the given probes.
    pub fn new(probes: ProbeSet) -> Self {
        Self { probes }
    }

    /// Probe all services concurrently and reconcile them against `previous`.
    ///
    /// Returns once every probe has been merged. Services that are no longer
    /// configured are dropped from the snapshot.
    pub async fn run(&self, previous: Snapshot, now: DateTime<Utc>) -> RunReport {
        let window = BucketWindow::at(now);
        let previous = Arc::new(previous.entries);
        let entries: Arc<Mutex<BTreeMap<String, StatusEntry>>> = Arc::new(Mutex::new(BTreeMap::new()));

        tracing::info!("Probing {} services", self.probes.len());

        let mut tasks = JoinSet::new();

        for (name, probe) in &self.probes {
            tracing::debug!("Checking {}...", name);

            let name = name.clone();
            let probe = probe.clone();
            let previous = previous.clone();
            let entries = entries.clone();

            tasks.spawn(async move {
                // Add jitter to avoid thundering herd
                let jitter = rand::random::<u64>() % 100;
                tokio::time::sleep(Duration::from_millis(jitter)).await;

                let outcome = probe.resolve().await;
                if !outcome.succeeded() {
                    tracing::warn!("{} is down: {}", name, outcome.error);
                }

                let entry = reconcile(previous.get(&name), outcome, window, now);
                entries.lock().await.insert(name, entry);
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Probe task failed: {}", e);
            }
        }

        let mut entries = std::mem::take(&mut *entries.lock().await);

        // A task that died never wrote its slot
        for (name, probe) in &self.probes {
            if !entries.contains_key(name) {
                let outcome = ProbeOutcome::down(probe.kind(), "probe task failed", 0, now.timestamp());
                entries.insert(name.clone(), reconcile(previous.get(name), outcome, window, now));
            }
        }

        let down_count = entries.values().filter(|e| !e.is_up()).count() as u64;
        let transition_count = entries.values().filter(|e| e.is_transition).count() as u64;

        let snapshot = Snapshot {
            generated_at: Utc::now().timestamp(),
            entries,
            down_count,
            transition_count,
        };
        let summary = Summary::of(&snapshot);

        tracing::info!(
            "Run complete: {} online, {} offline, {} changed",
            summary.online,
            summary.offline,
            transition_count
        );

        RunReport { snapshot, summary }
    }
}
