//! StatusTrail - Service Status Monitor
//!
//! Probes every configured service once, records up/down transitions and
//! downtime history, and publishes the result. Meant to be run periodically
//! by an external scheduler.

mod config;
mod notify;
mod probe;
mod scheduler;
mod status;

use config::RunConfig;
use notify::{dispatch_alerts, LogNotifier, Notifier};
use scheduler::{RunReport, Scheduler};
use status::SnapshotStore;

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("statustrail=info".parse()?))
        .init();

    // Load configuration
    let cfg = RunConfig::load();

    tracing::info!("Loading probe definitions from {}...", cfg.config_dir.display());
    let probes = probe::load_probes(&cfg.config_dir, cfg.probe_settings())?;

    tracing::info!("Reading previous status from {}...", cfg.state_path.display());
    let store = SnapshotStore::new(&cfg.state_path, &cfg.public_dir);
    let previous = store.load(Utc::now()).await?;

    let scheduler = Scheduler::new(probes);
    let report = scheduler.run(previous, Utc::now()).await;

    publish(&report, &store, &LogNotifier, &cfg.status_page).await;

    Ok(())
}

/// Alert on state changes, then save the snapshot.
///
/// A failed save is only logged; the alerts have already gone out.
/// Returns the number of services reported.
async fn publish(report: &RunReport, store: &SnapshotStore, notifier: &dyn Notifier, status_page: &str) -> usize {
    let alerted = dispatch_alerts(notifier, &report.snapshot, status_page);
    if alerted > 0 {
        tracing::info!("Reported {} state changes", alerted);
    }

    tracing::info!("Saving status data...");
    if let Err(e) = store.persist(&report.snapshot, &report.summary).await {
        tracing::warn!("Failed to persist status: {}", e);
    }

    alerted
}

#[cfg(test)]
mod tests {
    use super::*;
    use status::{Snapshot, StatusEntry, Summary};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingNotifier {
        services: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, transitions: &[(&str, &StatusEntry)], _status_page: &str) {
            self.services.fetch_add(transitions.len(), Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_alerts_sent_when_save_fails() {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        std::fs::write(&public, b"not a directory").unwrap();
        let store = SnapshotStore::new(dir.path().join("status.json"), &public);

        let mut snapshot = Snapshot::default();
        snapshot.entries.insert(
            "api".to_string(),
            StatusEntry {
                failed_since: 1000,
                error: "timeout".to_string(),
                is_transition: true,
                ..Default::default()
            },
        );
        let summary = Summary::of(&snapshot);
        let report = RunReport { snapshot, summary };

        let notifier = CountingNotifier::default();
        assert_eq!(publish(&report, &store, &notifier, "").await, 1);
        assert_eq!(notifier.services.load(Ordering::SeqCst), 1);
    }
}
