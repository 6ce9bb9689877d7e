//! HTTP API for the shared counter
//!
//! Thin mapping from requests to `CounterStore` calls:
//! - `POST /counter/increment` - increment on behalf of a caller
//! - `GET /counter` - current value and recent history
//! - `GET /counter/audit` - full-history consistency audit
//! - `GET /health` - liveness

pub mod http;
pub mod rest;
pub mod state;

pub use http::{create_router, start_server, ServerConfig};
pub use state::AppState;
