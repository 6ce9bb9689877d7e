//! History types for the increment log
//!
//! Every successful increment appends exactly one `HistoryEntry`. Entries are
//! immutable once committed and are ordered by their store-assigned `id`.

use serde::{Deserialize, Serialize};

/// An immutable record of one committed increment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonically increasing sequence ID, assigned at commit time
    #[serde(rename = "id")]
    pub sequence_id: i64,

    /// Counter value immediately after the increment that produced this entry
    #[serde(rename = "value")]
    pub resulting_value: i64,

    /// Caller that performed the increment
    #[serde(rename = "who")]
    pub actor: String,

    /// UTC commit time, RFC 3339 with a trailing `Z`
    #[serde(rename = "createdUtc")]
    pub timestamp_utc: String,
}

impl HistoryEntry {
    pub fn new(sequence_id: i64, resulting_value: i64, actor: String, timestamp_utc: String) -> Self {
        Self {
            sequence_id,
            resulting_value,
            actor,
            timestamp_utc,
        }
    }
}

/// Counter value plus the most recent history, newest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub value: i64,
    #[serde(rename = "history")]
    pub recent_history: Vec<HistoryEntry>,
}

impl CounterSnapshot {
    /// Check that the history window is ordered by sequence ID, newest first
    pub fn is_newest_first(&self) -> bool {
        self.recent_history
            .windows(2)
            .all(|w| w[0].sequence_id > w[1].sequence_id)
    }
}

/// Result of a successful increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementOutcome {
    pub new_value: i64,
    pub sequence_id: i64,
}

/// Inclusive run of counter values that no history entry produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub start: i64,
    pub end: i64,
}

impl ValueRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of values in the range
    pub fn count(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }
}

/// Audit over the full history log
///
/// A serialized history has no duplicates, no gaps and ends at the current
/// counter value. Anything else is the footprint of a lost update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryAudit {
    /// Current counter value
    pub value: i64,
    /// Total number of history entries
    pub entry_count: usize,
    /// Number of different resulting values in the log
    pub distinct_values: usize,
    /// Resulting values that appear more than once
    pub duplicates: Vec<i64>,
    /// Runs of values missing between the lowest and highest recorded value
    pub gaps: Vec<ValueRange>,
    /// Whether the counter equals the last committed history value
    pub value_matches_last_entry: bool,
}

impl HistoryAudit {
    /// Build an audit from the counter value and the history
    pub fn from_history(value: i64, history: &[HistoryEntry]) -> Self {
        let mut values: Vec<i64> = history.iter().map(|e| e.resulting_value).collect();
        values.sort_unstable();

        let mut duplicates: Vec<i64> = values
            .windows(2)
            .filter(|w| w[0] == w[1])
            .map(|w| w[0])
            .collect();
        duplicates.dedup();

        values.dedup();
        let gaps = values
            .windows(2)
            .filter(|w| w[1] > w[0] + 1)
            .map(|w| ValueRange::new(w[0] + 1, w[1] - 1))
            .collect();

        let last_value = history
            .iter()
            .max_by_key(|e| e.sequence_id)
            .map(|e| e.resulting_value);

        Self {
            value,
            entry_count: history.len(),
            distinct_values: values.len(),
            duplicates,
            gaps,
            value_matches_last_entry: last_value.map_or(true, |last| last == value),
        }
    }

    /// No duplicates, no gaps, and the counter agrees with the log
    pub fn is_consistent(&self) -> bool {
        self.duplicates.is_empty() && self.gaps.is_empty() && self.value_matches_last_entry
    }

    /// Increments that committed a value some earlier increment had already
    /// produced. Independent of the value the counter started from.
    pub fn lost_updates(&self) -> usize {
        self.entry_count.saturating_sub(self.distinct_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, value: i64) -> HistoryEntry {
        HistoryEntry::new(id, value, "u".to_string(), "2024-01-01T00:00:00Z".to_string())
    }

    #[test]
    fn test_history_entry_serialization() {
        let e = HistoryEntry::new(7, 3, "Duyan".to_string(), "2024-01-01T00:00:00.000Z".to_string());
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"value\":3"));
        assert!(json.contains("\"who\":\"Duyan\""));
        assert!(json.contains("\"createdUtc\":\"2024-01-01T00:00:00.000Z\""));
    }

    #[test]
    fn test_audit_consistent_history() {
        let history = vec![entry(1, 1), entry(2, 2), entry(3, 3)];
        let audit = HistoryAudit::from_history(3, &history);

        assert!(audit.is_consistent());
        assert_eq!(audit.entry_count, 3);
        assert_eq!(audit.lost_updates(), 0);
    }

    #[test]
    fn test_audit_detects_duplicates() {
        // Two callers both read 0 and both wrote 1
        let history = vec![entry(1, 1), entry(2, 1), entry(3, 2)];
        let audit = HistoryAudit::from_history(2, &history);

        assert!(!audit.is_consistent());
        assert_eq!(audit.duplicates, vec![1]);
        assert!(audit.gaps.is_empty());
        assert_eq!(audit.lost_updates(), 1);
    }

    #[test]
    fn test_audit_detects_gaps() {
        let history = vec![entry(1, 1), entry(2, 4), entry(3, 5), entry(4, 8)];
        let audit = HistoryAudit::from_history(8, &history);

        assert_eq!(audit.gaps, vec![ValueRange::new(2, 3), ValueRange::new(6, 7)]);
        assert_eq!(audit.gaps[0].count(), 2);
        assert!(!audit.is_consistent());
    }

    #[test]
    fn test_lost_updates_after_nonzero_start() {
        // Counter was set to 100 outside the service, then two callers
        // both read 100 and both wrote 101
        let history = vec![entry(1, 1), entry(2, 2), entry(3, 101), entry(4, 101)];
        let audit = HistoryAudit::from_history(101, &history);

        assert_eq!(audit.entry_count, 4);
        assert_eq!(audit.distinct_values, 3);
        assert_eq!(audit.duplicates, vec![101]);
        assert_eq!(audit.lost_updates(), 1);
    }

    #[test]
    fn test_empty_history_is_consistent() {
        let audit = HistoryAudit::from_history(0, &[]);

        assert!(audit.is_consistent());
        assert_eq!(audit.lost_updates(), 0);
    }

    #[test]
    fn test_audit_detects_counter_mismatch() {
        let history = vec![entry(1, 1), entry(2, 2)];
        let audit = HistoryAudit::from_history(5, &history);

        assert!(!audit.value_matches_last_entry);
    }

    #[test]
    fn test_snapshot_ordering_check() {
        let snapshot = CounterSnapshot {
            value: 3,
            recent_history: vec![entry(3, 3), entry(2, 2), entry(1, 1)],
        };
        assert!(snapshot.is_newest_first());

        let unordered = CounterSnapshot {
            value: 3,
            recent_history: vec![entry(1, 1), entry(3, 3)],
        };
        assert!(!unordered.is_newest_first());
    }
}
