//! Time and timestamp utilities

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 text with millisecond precision and a `Z` suffix
///
/// The fixed width keeps stored timestamps sortable as plain text.
pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
