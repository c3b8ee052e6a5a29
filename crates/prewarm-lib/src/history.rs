//! Per-function invocation log
//!
//! Append-only timestamps keyed by function id. Appends for one function
//! serialize on its map shard; different functions proceed in parallel.

use crate::models::InvocationRecord;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Invocation timestamps for every function seen by a deployment
#[derive(Debug, Default)]
pub struct InvocationHistory {
    records: DashMap<String, Vec<InvocationRecord>>,
}

impl InvocationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an invocation. Callers are expected to pass non-decreasing
    /// timestamps but nothing here depends on it.
    pub fn record(&self, function_id: &str, timestamp: DateTime<Utc>) {
        match self.records.get_mut(function_id) {
            Some(mut entry) => entry.push(timestamp),
            None => {
                self.records
                    .entry(function_id.to_string())
                    .or_default()
                    .push(timestamp);
            }
        }
    }

    /// Timestamps in `[now - window, now]`, in insertion order
    pub fn recent(
        &self,
        function_id: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Vec<InvocationRecord> {
        let start = now - window;
        self.records
            .get(function_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|t| start <= **t && **t <= now)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of retained records for a function
    pub fn len(&self, function_id: &str) -> usize {
        self.records.get(function_id).map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of every function with retained history
    pub fn functions(&self) -> Vec<String> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }

    /// Total number of retained records across functions
    pub fn total_records(&self) -> usize {
        self.records.iter().map(|e| e.value().len()).sum()
    }

    /// Drop records older than `now - retention` and forget functions left
    /// without any. Returns the number of records removed.
    pub fn trim(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let mut removed = 0;

        self.records.retain(|_, timestamps| {
            let before = timestamps.len();
            timestamps.retain(|t| *t >= cutoff);
            removed += before - timestamps.len();
            !timestamps.is_empty()
        });

        if removed > 0 {
            debug!(removed = removed, cutoff = %cutoff, "Trimmed invocation history");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_unknown_function_has_no_history() {
        let history = InvocationHistory::new();
        assert!(history.recent("missing", at(1, 12), Duration::hours(24)).is_empty());
        assert_eq!(history.len("missing"), 0);
    }

    #[test]
    fn test_recent_window_bounds_are_inclusive() {
        let history = InvocationHistory::new();
        let t = at(1, 10);
        history.record("fn", t);

        let window = Duration::hours(24);
        assert_eq!(history.recent("fn", t, window), vec![t]);
        assert_eq!(history.recent("fn", t + window, window), vec![t]);
        assert!(history
            .recent("fn", t + window + Duration::seconds(1), window)
            .is_empty());
        // Records in the future of `now` are excluded
        assert!(history.recent("fn", t - Duration::seconds(1), window).is_empty());
    }

    #[test]
    fn test_recent_preserves_insertion_order() {
        let history = InvocationHistory::new();
        let times = [at(2, 3), at(2, 1), at(2, 2)];
        for t in times {
            history.record("fn", t);
        }

        let recent = history.recent("fn", at(2, 5), Duration::hours(24));
        assert_eq!(recent, times.to_vec());
    }

    #[test]
    fn test_trim_drops_old_records_and_empty_functions() {
        let history = InvocationHistory::new();
        history.record("old", at(1, 0));
        history.record("mixed", at(1, 0));
        history.record("mixed", at(3, 0));

        let removed = history.trim(at(3, 12), Duration::hours(24));

        assert_eq!(removed, 2);
        assert_eq!(history.len("mixed"), 1);
        assert_eq!(history.functions(), vec!["mixed".to_string()]);
        assert_eq!(history.total_records(), 1);
    }
}
