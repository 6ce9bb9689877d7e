//! Counter Store - the only write path for the shared counter
//!
//! `increment` is a read-modify-write with a deliberate processing delay
//! between the read and the write. Whether concurrent increments can lose
//! updates is decided by `ConsistencyMode`:
//!
//! - `Serialized`: a per-counter lock is held from the read until the commit
//!   (delay included), and the commit is guarded by compare-and-set. If
//!   another writer on the same database moved the counter during the delay,
//!   the attempt is discarded and repeated from a fresh read. N concurrent
//!   increments always yield N consecutive values.
//! - `Unserialized`: read, wait, write with no exclusion. Overlapping calls can
//!   read the same base value and write the same result. This mode exists to
//!   reproduce the lost-update anomaly and exhibits it on purpose.
//!
//! Either way a single attempt is all-or-nothing: the counter update and the
//! history append commit together or not at all.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::repository::{CounterRepository, RepositoryError};
use crate::types::{
    CounterSnapshot, HistoryAudit, HistoryEntry, IncrementOutcome, DEFAULT_HISTORY_LIMIT,
};
use crate::utils::parse_env_var;
use crate::validation::validate_actor;

/// Consistency guarantee for concurrent increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Increments are linearized; no lost updates
    #[default]
    Serialized,
    /// No mutual exclusion; exhibits the lost-update anomaly
    Unserialized,
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyMode::Serialized => write!(f, "serialized"),
            ConsistencyMode::Unserialized => write!(f, "unserialized"),
        }
    }
}

impl FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serialized" => Ok(ConsistencyMode::Serialized),
            "unserialized" | "naive" => Ok(ConsistencyMode::Unserialized),
            other => Err(format!("unknown consistency mode '{}'", other)),
        }
    }
}

/// Configuration for the CounterStore
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Pause between reading the counter and writing the new value
    pub delay: Duration,
    /// Consistency guarantee for concurrent increments
    pub mode: ConsistencyMode,
    /// Number of history entries returned by `snapshot`
    pub history_limit: usize,
    /// Deadline for one increment call, lock wait and retries included
    pub timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            mode: ConsistencyMode::Serialized,
            history_limit: DEFAULT_HISTORY_LIMIT,
            timeout: None,
        }
    }
}

impl StoreConfig {
    /// Create the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from environment variables.
    ///
    /// Reads:
    /// - `COUNTER_DELAY_MS`: processing delay (default: 2000)
    /// - `COUNTER_MODE`: `serialized` or `unserialized` (default: serialized)
    /// - `COUNTER_HISTORY_LIMIT`: snapshot history size (default: 20)
    /// - `COUNTER_TIMEOUT_MS`: per-increment deadline (default: none)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            delay: parse_env_var::<u64>("COUNTER_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.delay),
            mode: parse_env_var("COUNTER_MODE").unwrap_or(default.mode),
            history_limit: parse_env_var::<usize>("COUNTER_HISTORY_LIMIT")
                .filter(|&limit| limit > 0)
                .unwrap_or(default.history_limit),
            timeout: parse_env_var::<u64>("COUNTER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(default.timeout),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_mode(mut self, mode: ConsistencyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result type for CounterStore operations
pub type CounterResult<T> = Result<T, CounterError>;

/// Errors surfaced by the CounterStore
#[derive(Error, Debug)]
pub enum CounterError {
    /// Caller-supplied data failed validation
    #[error("{0}")]
    InvalidArgument(String),

    /// The backend could not be reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The unit of work could not be committed and was rolled back
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// The attempt did not reach its commit before the deadline
    #[error("Increment did not complete within {0:?}")]
    Timeout(Duration),
}

impl CounterError {
    /// Stable, human-readable title for this class of failure
    pub fn title(&self) -> &'static str {
        match self {
            CounterError::InvalidArgument(_) => "Invalid request",
            CounterError::StorageUnavailable(_) => "Storage unavailable",
            CounterError::CommitFailed(_) => "Could not update counter",
            CounterError::Timeout(_) => "Counter update timed out",
        }
    }

    /// Whether the caller, not the service, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, CounterError::InvalidArgument(_))
    }

    fn from_read(e: RepositoryError) -> Self {
        CounterError::StorageUnavailable(e.to_string())
    }

    fn from_commit(e: RepositoryError) -> Self {
        if e.is_unavailable() {
            CounterError::StorageUnavailable(e.to_string())
        } else {
            CounterError::CommitFailed(e.to_string())
        }
    }
}

/// Owner of the shared counter and its history log
pub struct CounterStore {
    repository: Box<dyn CounterRepository>,
    config: StoreConfig,
    /// Held across read-delay-commit in `Serialized` mode.
    /// Scoped to this store's single counter.
    write_lock: Mutex<()>,
}

impl CounterStore {
    /// Bootstrap the repository and build a store on top of it
    pub fn open<R>(repository: R, config: StoreConfig) -> CounterResult<Self>
    where
        R: CounterRepository + 'static,
    {
        repository.bootstrap().map_err(CounterError::from_read)?;

        tracing::info!(
            mode = %config.mode,
            delay_ms = config.delay.as_millis() as u64,
            history_limit = config.history_limit,
            "Counter store ready"
        );

        Ok(Self {
            repository: Box::new(repository),
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the consistency mode
    pub fn mode(&self) -> ConsistencyMode {
        self.config.mode
    }

    /// Increment the counter on behalf of `actor`
    ///
    /// On success the new value and its history entry are committed together.
    /// On any error, stored state is exactly as it was before the call.
    pub async fn increment(&self, actor: &str) -> CounterResult<IncrementOutcome> {
        let actor = validate_actor(actor).map_err(CounterError::InvalidArgument)?;

        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.increment_once(actor)).await {
                Ok(result) => result,
                Err(_) => Err(CounterError::Timeout(limit)),
            },
            None => self.increment_once(actor).await,
        };

        if let Err(ref e) = result {
            tracing::warn!(actor, error = %e, "Increment failed; counter unchanged");
        }
        result
    }

    async fn increment_once(&self, actor: &str) -> CounterResult<IncrementOutcome> {
        let guard = match self.config.mode {
            ConsistencyMode::Serialized => Some(self.write_lock.lock().await),
            ConsistencyMode::Unserialized => None,
        };
        let guarded = guard.is_some();

        let mut retries = 0u32;
        loop {
            match self.read_modify_write(actor, guarded).await? {
                Attempt::Committed(entry) => {
                    tracing::debug!(
                        actor,
                        value = entry.resulting_value,
                        sequence_id = entry.sequence_id,
                        retries,
                        "Increment committed"
                    );
                    return Ok(IncrementOutcome {
                        new_value: entry.resulting_value,
                        sequence_id: entry.sequence_id,
                    });
                }
                Attempt::Stale { expected, found } => {
                    retries += 1;
                    tracing::debug!(actor, expected, found, retries, "Counter moved; retrying");
                }
            }
        }
    }

    /// Read, wait, then commit
    ///
    /// The only await point is the delay, so a cancelled or timed-out call
    /// is dropped before the commit and leaves nothing behind.
    async fn read_modify_write(&self, actor: &str, guarded: bool) -> CounterResult<Attempt> {
        let current = self
            .repository
            .read_value()
            .map_err(CounterError::from_read)?;
        let new_value = current
            .checked_add(1)
            .ok_or_else(|| CounterError::CommitFailed("counter overflow".to_string()))?;

        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        let expected = guarded.then_some(current);
        match self.repository.commit_increment(new_value, expected, actor) {
            Ok(entry) => Ok(Attempt::Committed(entry)),
            Err(RepositoryError::Conflict { expected, found }) => {
                Ok(Attempt::Stale { expected, found })
            }
            Err(e) => Err(CounterError::from_commit(e)),
        }
    }

    /// Latest committed value and the most recent history, newest first
    pub fn snapshot(&self) -> CounterResult<CounterSnapshot> {
        self.repository
            .snapshot(Some(self.config.history_limit))
            .map_err(CounterError::from_read)
    }

    /// Audit the full history for duplicates, gaps and counter drift
    pub fn verify(&self) -> CounterResult<HistoryAudit> {
        self.repository.audit().map_err(CounterError::from_read)
    }
}

/// How one read-delay-commit attempt ended
enum Attempt {
    Committed(HistoryEntry),
    /// The counter no longer held the value that was read
    Stale { expected: i64, found: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::MemoryRepository;

    fn create_test_store(mode: ConsistencyMode) -> CounterStore {
        let config = StoreConfig::new()
            .with_delay(Duration::ZERO)
            .with_mode(mode);
        CounterStore::open(MemoryRepository::new(), config).unwrap()
    }

    #[test]
    fn test_consistency_mode_parsing() {
        assert_eq!(
            "serialized".parse::<ConsistencyMode>().unwrap(),
            ConsistencyMode::Serialized
        );
        assert_eq!(
            " Unserialized ".parse::<ConsistencyMode>().unwrap(),
            ConsistencyMode::Unserialized
        );
        assert_eq!(
            "naive".parse::<ConsistencyMode>().unwrap(),
            ConsistencyMode::Unserialized
        );
        assert!("eventual".parse::<ConsistencyMode>().is_err());
        assert_eq!(ConsistencyMode::default(), ConsistencyMode::Serialized);
        assert_eq!(ConsistencyMode::Unserialized.to_string(), "unserialized");
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.delay, Duration::from_secs(2));
        assert_eq!(config.mode, ConsistencyMode::Serialized);
        assert_eq!(config.history_limit, 20);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_error_titles() {
        assert!(CounterError::InvalidArgument("x".into()).is_client_error());
        assert!(!CounterError::CommitFailed("x".into()).is_client_error());
        assert_eq!(
            CounterError::CommitFailed("x".into()).title(),
            "Could not update counter"
        );
    }

    #[tokio::test]
    async fn test_sequential_increments() {
        let store = create_test_store(ConsistencyMode::Serialized);

        assert_eq!(store.increment("a").await.unwrap().new_value, 1);
        assert_eq!(store.increment("b").await.unwrap().new_value, 2);

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.value, 2);
        assert_eq!(snapshot.recent_history[0].actor, "b");
    }

    #[tokio::test]
    async fn test_actor_is_stored_trimmed() {
        let store = create_test_store(ConsistencyMode::Serialized);
        store.increment("  Duyan  ").await.unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.recent_history[0].actor, "Duyan");
    }

    #[tokio::test]
    async fn test_invalid_actor_changes_nothing() {
        let store = create_test_store(ConsistencyMode::Serialized);

        for actor in ["", "   "] {
            let err = store.increment(actor).await.unwrap_err();
            assert!(matches!(err, CounterError::InvalidArgument(_)));
        }

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.value, 0);
        assert!(snapshot.recent_history.is_empty());
    }

    #[tokio::test]
    async fn test_history_limit_bounds_snapshot() {
        let config = StoreConfig::new()
            .with_delay(Duration::ZERO)
            .with_history_limit(3);
        let store = CounterStore::open(MemoryRepository::new(), config).unwrap();

        for i in 0..5 {
            store.increment(&format!("u{}", i)).await.unwrap();
        }

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.value, 5);
        assert_eq!(snapshot.recent_history.len(), 3);
        assert!(store.verify().unwrap().is_consistent());
        assert_eq!(store.verify().unwrap().entry_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serialized_retries_after_outside_write() {
        let repo = std::sync::Arc::new(MemoryRepository::new());
        let store = std::sync::Arc::new(
            CounterStore::open(std::sync::Arc::clone(&repo), StoreConfig::default()).unwrap(),
        );

        let pending = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.increment("inside").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Someone else commits while the increment is in its delay
        repo.commit_increment(7, None, "outside").unwrap();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome.new_value, 8);

        let audit = store.verify().unwrap();
        assert_eq!(audit.value, 8);
        assert_eq!(audit.entry_count, 2);
        assert_eq!(audit.lost_updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_bounded_by_timeout() {
        let repo = std::sync::Arc::new(MemoryRepository::new());
        let config = StoreConfig::default().with_timeout(Duration::from_secs(3));
        let store = std::sync::Arc::new(
            CounterStore::open(std::sync::Arc::clone(&repo), config).unwrap(),
        );

        let pending = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move { store.increment("inside").await })
        };

        // First attempt goes stale at t=2s; its retry cannot finish before t=3s
        tokio::time::sleep(Duration::from_millis(100)).await;
        repo.commit_increment(7, None, "outside").unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, CounterError::Timeout(_)));
        assert_eq!(store.snapshot().unwrap().value, 7);
    }
}
