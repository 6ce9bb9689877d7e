//! Storage seam behind the CounterStore
//!
//! A repository owns the single counter row and the history log. Every
//! method is one short unit of work; the store decides how those units are
//! sequenced around the processing delay.

use std::sync::Arc;

use thiserror::Error;

use crate::types::{CounterSnapshot, HistoryAudit, HistoryEntry};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by a repository backend
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Counter row {0} is missing; bootstrap has not run")]
    MissingCounter(i64),

    #[error("Counter changed concurrently: expected {expected}, found {found}")]
    Conflict { expected: i64, found: i64 },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether the backend could not be reached at all, as opposed to a
    /// unit of work that was reached but refused
    pub fn is_unavailable(&self) -> bool {
        match self {
            RepositoryError::Unavailable(_) | RepositoryError::Io(_) => true,
            RepositoryError::Sqlite(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::CannotOpen)
                    | Some(rusqlite::ErrorCode::DatabaseBusy)
                    | Some(rusqlite::ErrorCode::DatabaseLocked)
            ),
            RepositoryError::MissingCounter(_) | RepositoryError::Conflict { .. } => false,
        }
    }
}

/// Durable backend for the counter and its history
///
/// # Invariants
/// - `commit_increment` writes the counter and appends the history entry in
///   one atomic unit: both are committed or neither is
/// - History IDs and timestamps are assigned inside the commit, so both
///   follow commit order
/// - Reads never mutate state
pub trait CounterRepository: Send + Sync {
    /// Create the counter row (value 0) and the history log if absent.
    /// Safe to call on every startup.
    fn bootstrap(&self) -> RepositoryResult<()>;

    /// Read the committed counter value.
    fn read_value(&self) -> RepositoryResult<i64>;

    /// Set the counter to `new_value` and append a history entry for it.
    ///
    /// With `expected = Some(v)` the update only applies while the stored
    /// value is still `v`; otherwise `Conflict` is returned and nothing is
    /// written. With `None` the write is unconditional.
    fn commit_increment(
        &self,
        new_value: i64,
        expected: Option<i64>,
        actor: &str,
    ) -> RepositoryResult<HistoryEntry>;

    /// Read the counter value and history, newest first.
    /// `None` returns the whole log.
    fn snapshot(&self, limit: Option<usize>) -> RepositoryResult<CounterSnapshot>;

    /// Audit the whole log against the counter, aggregated by the backend
    fn audit(&self) -> RepositoryResult<HistoryAudit>;
}

/// Shared handles delegate to the underlying repository, so a caller can keep
/// an `Arc` to the backend the store was opened with
impl<R: CounterRepository + ?Sized> CounterRepository for Arc<R> {
    fn bootstrap(&self) -> RepositoryResult<()> {
        (**self).bootstrap()
    }

    fn read_value(&self) -> RepositoryResult<i64> {
        (**self).read_value()
    }

    fn commit_increment(
        &self,
        new_value: i64,
        expected: Option<i64>,
        actor: &str,
    ) -> RepositoryResult<HistoryEntry> {
        (**self).commit_increment(new_value, expected, actor)
    }

    fn snapshot(&self, limit: Option<usize>) -> RepositoryResult<CounterSnapshot> {
        (**self).snapshot(limit)
    }

    fn audit(&self) -> RepositoryResult<HistoryAudit> {
        (**self).audit()
    }
}
