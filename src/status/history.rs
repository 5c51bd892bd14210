//! Calendar-day downtime ledger.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Days of downtime retained in the ledger.
pub const HISTORY_RETENTION_DAYS: i64 = 90;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Downtime minutes per UTC calendar day for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DowntimeHistory {
    /// Unix seconds of the last observation, 0 if never observed.
    pub checked_at: i64,
    /// Minutes down keyed by `YYYY-MM-DD`.
    pub downtimes: BTreeMap<String, i64>,
}

impl DowntimeHistory {
    /// Record one observation made at `now`.
    ///
    /// While down, the time since the previous observation is attributed to
    /// the calendar day(s) it falls on, split at UTC midnight.
    pub fn track_historic(&mut self, is_up: bool, now: DateTime<Utc>) {
        self.prune(now);

        // Downtime older than the retention window is never recorded
        let mut since = self.since(now).max(oldest_retained_day(now));
        self.checked_at = now.timestamp();

        if is_up {
            return;
        }

        let today = floor_day(now);

        while floor_day(since) < today {
            let next = floor_day(since) + ChronoDuration::days(1);
            self.add(since, next);
            since = next;
        }

        self.add(since, now);
    }

    /// Drop days older than the retention window, and any unparseable keys.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - ChronoDuration::days(HISTORY_RETENTION_DAYS);

        self.downtimes.retain(|day, _| {
            NaiveDate::parse_from_str(day, DAY_FORMAT)
                .map(|d| d.and_time(NaiveTime::MIN).and_utc() >= cutoff)
                .unwrap_or(false)
        });
    }

    /// Total minutes down across the retained days.
    pub fn total_minutes(&self) -> i64 {
        self.downtimes.values().sum()
    }

    fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first = now - ChronoDuration::minutes(1);

        if self.checked_at == 0 {
            return first;
        }

        match DateTime::from_timestamp(self.checked_at, 0) {
            // A clock that went backwards accrues nothing
            Some(at) => at.min(now),
            None => first,
        }
    }

    /// Count the minute boundaries crossed between `since` and `until`, so
    /// gaps shorter than a minute still add up across runs.
    fn add(&mut self, since: DateTime<Utc>, until: DateTime<Utc>) {
        let minutes = until.timestamp().div_euclid(60) - since.timestamp().div_euclid(60);
        if minutes <= 0 {
            return;
        }

        let key = since.format(DAY_FORMAT).to_string();
        *self.downtimes.entry(key).or_insert(0) += minutes;
    }
}

fn floor_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight of the oldest day that survives pruning at `now`.
fn oldest_retained_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let cutoff = now - ChronoDuration::days(HISTORY_RETENTION_DAYS);
    let day = floor_day(cutoff);

    if day < cutoff {
        day + ChronoDuration::days(1)
    } else {
        day
    }
}
