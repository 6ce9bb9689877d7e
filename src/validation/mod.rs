//! Input validation for counter operations
//!
//! This module rejects caller-supplied data before it reaches storage.

mod actor;

pub use actor::validate_actor;
