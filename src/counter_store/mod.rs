//! Counter Store Module
//!
//! This module owns the shared counter and its append-only history:
//! - `CounterStore`: validated, delayed read-modify-write with an explicit
//!   consistency mode
//! - `CounterRepository`: the storage seam (bootstrap, read, atomic commit,
//!   snapshot, audit)
//! - `SqliteRepository`: durable backend on SQLite
//! - `MemoryRepository`: in-process backend for tests and demos
//!
//! # Increment path
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────────────────┐
//! │ validate │──►│ lock      │──►│ read value │──►│ sleep delay │──►│ commit: UPDATE value │
//! │ actor    │   │ (serial.) │   │            │   │             │   │  + INSERT history    │
//! └──────────┘   └───────────┘   └────────────┘   └─────────────┘   └──────────────────────┘
//! ```
//!
//! In `Serialized` mode a commit that finds the counter changed (another
//! process on the same database) loops back to the read. In `Unserialized`
//! mode the lock step is skipped and the commit is unconditional, which is
//! what lets two overlapping calls write the same value.

mod memory;
mod repository;
mod sqlite;
mod store;

pub use memory::MemoryRepository;
pub use repository::{CounterRepository, RepositoryError, RepositoryResult};
pub use sqlite::{SqliteRepository, DEFAULT_BUSY_TIMEOUT};
pub use store::{ConsistencyMode, CounterError, CounterResult, CounterStore, StoreConfig};
