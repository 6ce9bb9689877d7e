//! Actor validation for increment requests

/// Validate the caller identity and return it trimmed
///
/// Empty and whitespace-only actors are rejected with a human-readable reason.
pub fn validate_actor(actor: &str) -> Result<&str, String> {
    let trimmed = actor.trim();
    if trimmed.is_empty() {
        return Err("actor must not be empty".to_string());
    }
    Ok(trimmed)
}
