//! REST API module for HTTP endpoints
//!
//! Provides the counter endpoints:
//! - `POST /counter/increment` - Increment the counter
//! - `GET /counter` - Value plus the 20 most recent history entries
//! - `GET /counter/audit` - Duplicate/gap audit over the full history

pub mod counter;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::counter_store::CounterError;

/// Problem-details style error body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub title: String,
    pub detail: String,
    pub status: u16,
}

impl ApiError {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            status: status.as_u16(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Invalid request", detail)
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<CounterError> for ApiError {
    fn from(e: CounterError) -> Self {
        let status = match e {
            CounterError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CounterError::StorageUnavailable(_) | CounterError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CounterError::CommitFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.title(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counter_error_status_mapping() {
        let cases = [
            (CounterError::InvalidArgument("bad".into()), 400),
            (CounterError::StorageUnavailable("down".into()), 503),
            (CounterError::Timeout(Duration::from_secs(1)), 503),
            (CounterError::CommitFailed("conflict".into()), 500),
        ];

        for (error, status) in cases {
            let api_error = ApiError::from(error);
            assert_eq!(api_error.status, status);
            assert!(!api_error.title.is_empty());
            assert!(!api_error.detail.is_empty());
        }
    }

    #[test]
    fn test_commit_failure_has_stable_title() {
        let api_error = ApiError::from(CounterError::CommitFailed("database is locked".into()));
        assert_eq!(api_error.title, "Could not update counter");
        assert!(api_error.detail.contains("database is locked"));
        assert_eq!(api_error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
