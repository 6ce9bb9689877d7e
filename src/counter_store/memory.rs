//! In-memory counter repository
//!
//! Same contract as the SQLite backend, without durability. Used by tests and
//! demos, and able to simulate an unreachable backend.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::repository::{CounterRepository, RepositoryError, RepositoryResult};
use crate::types::{CounterSnapshot, HistoryAudit, HistoryEntry, COUNTER_ID};
use crate::utils::utc_now_rfc3339;

#[derive(Debug, Default)]
struct MemoryState {
    /// `None` until bootstrap has run
    value: Option<i64>,
    /// History in commit order
    history: Vec<HistoryEntry>,
    /// Last assigned history ID
    last_sequence_id: i64,
}

/// Counter repository held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    /// Create an empty repository; call `bootstrap` before use
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (or coming back)
    ///
    /// While unavailable every operation fails with `Unavailable` and
    /// nothing is written.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> RepositoryResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory backend is offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl CounterRepository for MemoryRepository {
    fn bootstrap(&self) -> RepositoryResult<()> {
        self.check_available()?;
        let mut state = self.state.lock();
        if state.value.is_none() {
            state.value = Some(0);
        }
        Ok(())
    }

    fn read_value(&self) -> RepositoryResult<i64> {
        self.check_available()?;
        self.state
            .lock()
            .value
            .ok_or(RepositoryError::MissingCounter(COUNTER_ID))
    }

    fn commit_increment(
        &self,
        new_value: i64,
        expected: Option<i64>,
        actor: &str,
    ) -> RepositoryResult<HistoryEntry> {
        self.check_available()?;
        let mut state = self.state.lock();

        // All checks happen before the first mutation
        let found = state.value.ok_or(RepositoryError::MissingCounter(COUNTER_ID))?;
        if let Some(expected) = expected {
            if found != expected {
                return Err(RepositoryError::Conflict { expected, found });
            }
        }

        state.last_sequence_id += 1;
        let entry = HistoryEntry::new(
            state.last_sequence_id,
            new_value,
            actor.to_string(),
            utc_now_rfc3339(),
        );
        state.value = Some(new_value);
        state.history.push(entry.clone());

        Ok(entry)
    }

    fn snapshot(&self, limit: Option<usize>) -> RepositoryResult<CounterSnapshot> {
        self.check_available()?;
        let state = self.state.lock();

        let value = state.value.ok_or(RepositoryError::MissingCounter(COUNTER_ID))?;
        let limit = limit.unwrap_or(usize::MAX);
        let recent_history = state.history.iter().rev().take(limit).cloned().collect();

        Ok(CounterSnapshot {
            value,
            recent_history,
        })
    }

    fn audit(&self) -> RepositoryResult<HistoryAudit> {
        self.check_available()?;
        let state = self.state.lock();

        let value = state.value.ok_or(RepositoryError::MissingCounter(COUNTER_ID))?;
        Ok(HistoryAudit::from_history(value, &state.history))
    }
}
