//! Shared application state for HTTP handlers

use std::sync::Arc;

use crate::counter_store::CounterStore;

/// State shared by all request handlers
pub struct AppState {
    /// The counter store; the only path to the counter and its history
    pub store: Arc<CounterStore>,
}

impl AppState {
    /// Create a new AppState around a store
    pub fn new(store: Arc<CounterStore>) -> Self {
        Self { store }
    }
}
