//! Data types for the Shared Counter service
//!
//! This module contains the core data structures shared by the store and the API.

mod history;

pub use history::{CounterSnapshot, HistoryAudit, HistoryEntry, IncrementOutcome, ValueRange};

/// Key of the single counter row
pub const COUNTER_ID: i64 = 1;

/// Number of history entries returned by a snapshot unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
