//! Alert dispatch for services that changed state.

use crate::status::{Snapshot, StatusEntry};

/// Receives the services whose state changed during a run.
pub trait Notifier {
    fn notify(&self, transitions: &[(&str, &StatusEntry)], status_page: &str);
}

/// Notifier that reports transitions through the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, transitions: &[(&str, &StatusEntry)], status_page: &str) {
        for (name, entry) in transitions {
            let downtime = entry
                .history
                .as_ref()
                .map(|h| h.total_minutes())
                .unwrap_or_default();

            if entry.is_up() {
                tracing::info!(
                    service = %name,
                    kind = %entry.kind,
                    downtime_minutes = downtime,
                    "{} is back up",
                    name
                );
            } else {
                tracing::warn!(
                    service = %name,
                    kind = %entry.kind,
                    down_since = entry.failed_since,
                    error = %entry.error,
                    "{} went down",
                    name
                );
            }
        }

        if !status_page.is_empty() {
            tracing::info!("Status page: {}", status_page);
        }
    }
}

/// Hand this run's transitions to `notifier`, if there are any.
///
/// Returns the number of services reported.
pub fn dispatch_alerts(notifier: &dyn Notifier, snapshot: &Snapshot, status_page: &str) -> usize {
    let transitions = snapshot.transitions();
    if transitions.is_empty() {
        return 0;
    }

    notifier.notify(&transitions, status_page);
    transitions.len()
}
