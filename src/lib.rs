//! Shared Counter Server
//!
//! A networked counter that many callers increment concurrently, with every
//! increment durably recorded in an append-only history log.
//!
//! # Features
//!
//! - **Explicit consistency**: `Serialized` (no lost updates) or `Unserialized`
//!   (reproduces the lost-update anomaly on purpose)
//! - **Atomic unit of work**: counter update and history append commit together
//! - **Injectable delay**: the read-modify-write race window is configurable
//! - **Audit**: detect duplicates and gaps across the full history
//!
//! # Modules
//!
//! - `types`: Core data structures (HistoryEntry, CounterSnapshot, HistoryAudit)
//! - `counter_store`: CounterStore and its SQLite / in-memory repositories
//! - `api`: Axum HTTP endpoints
//! - `validation`: Caller input validation
//! - `utils`: Timestamp and environment helpers
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shared_counter::{ConsistencyMode, CounterStore, SqliteRepository, StoreConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = SqliteRepository::open("data/app.db")?;
//! let config = StoreConfig::new()
//!     .with_delay(Duration::from_millis(500))
//!     .with_mode(ConsistencyMode::Serialized);
//! let store = CounterStore::open(repository, config)?;
//!
//! let outcome = store.increment("alice").await?;
//! println!("counter is now {}", outcome.new_value);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod counter_store;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items at crate root
pub use counter_store::{
    ConsistencyMode, CounterError, CounterRepository, CounterResult, CounterStore,
    MemoryRepository, RepositoryError, SqliteRepository, StoreConfig,
};
pub use types::{CounterSnapshot, HistoryAudit, HistoryEntry, IncrementOutcome, ValueRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
