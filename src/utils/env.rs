//! Environment variable helpers

use std::str::FromStr;

/// Read and parse an environment variable
///
/// Returns `None` when the variable is unset or empty. A value that does not
/// parse is ignored with a warning so the caller falls back to its default.
pub fn parse_env_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = raw, "Ignoring invalid environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_var() {
        std::env::set_var("SHARED_COUNTER_TEST_PARSE_OK", " 42 ");
        assert_eq!(parse_env_var::<u64>("SHARED_COUNTER_TEST_PARSE_OK"), Some(42));

        std::env::set_var("SHARED_COUNTER_TEST_PARSE_BAD", "forty-two");
        assert_eq!(parse_env_var::<u64>("SHARED_COUNTER_TEST_PARSE_BAD"), None);

        assert_eq!(parse_env_var::<u64>("SHARED_COUNTER_TEST_PARSE_UNSET"), None);
    }
}
