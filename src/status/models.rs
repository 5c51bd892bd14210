//! Persisted status model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::DowntimeHistory;
use crate::probe::ProbeKind;

/// Status of one service as persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusEntry {
    /// Unix seconds since the service has been down, 0 while up.
    #[serde(rename = "status")]
    pub failed_since: i64,
    #[serde(rename = "type")]
    pub kind: ProbeKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Failure counts keyed by 10-minute bucket index.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub historic: BTreeMap<i64, u32>,
    /// Probe duration in milliseconds.
    #[serde(rename = "time")]
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<DowntimeHistory>,
    /// Up/down state differs from the previous run. Recomputed every run.
    #[serde(skip)]
    pub is_transition: bool,
}

impl StatusEntry {
    pub fn is_up(&self) -> bool {
        self.error.is_empty()
    }
}

/// The whole run's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "time")]
    pub generated_at: i64,
    #[serde(rename = "data", default)]
    pub entries: BTreeMap<String, StatusEntry>,
    #[serde(rename = "down", default)]
    pub down_count: u64,
    #[serde(skip)]
    pub transition_count: u64,
}

impl Snapshot {
    /// An empty snapshot, used when no previous state exists.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now.timestamp(),
            ..Default::default()
        }
    }

    /// Entries ordered for display: down services first, then services that
    /// just changed state, then by name.
    pub fn display_order(&self) -> Vec<(&str, &StatusEntry)> {
        let mut ordered: Vec<_> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();

        ordered.sort_by(|(a_name, a), (b_name, b)| {
            let down = (a.failed_since != 0).cmp(&(b.failed_since != 0)).reverse();
            let new = a.is_transition.cmp(&b.is_transition).reverse();
            down.then(new).then_with(|| a_name.cmp(b_name))
        });

        ordered
    }

    /// Entries whose state changed this run, in display order.
    pub fn transitions(&self) -> Vec<(&str, &StatusEntry)> {
        self.display_order()
            .into_iter()
            .filter(|(_, entry)| entry.is_transition)
            .collect()
    }
}

/// Lightweight run summary published alongside the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: u64,
    pub online: u64,
    pub offline: u64,
}

impl Summary {
    pub fn of(snapshot: &Snapshot) -> Self {
        let total = snapshot.entries.len() as u64;
        let online = snapshot.entries.values().filter(|e| e.is_up()).count() as u64;

        Self {
            total,
            online,
            offline: total - online,
        }
    }
}
