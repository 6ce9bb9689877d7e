//! Utility functions and helpers
//!
//! This module contains timestamp and environment helpers.

pub mod env;
pub mod time;

pub use env::parse_env_var;
pub use time::utc_now_rfc3339;
