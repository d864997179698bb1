use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;

use crate::models::BookingStatus;

// Each variant names the offending field, see `field()`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("check-out date ({check_out}) must be after check-in date ({check_in})")]
    DateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("{requested} guests requested; this listing allows 1 to {max} guests")]
    Capacity { requested: u32, max: u32 },

    #[error("this listing is not available from {check_in} to {check_out}")]
    Availability {
        listing_id: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    #[error("cannot change status from {from} to {to}")]
    Transition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{field} must be {expected}, got {value}")]
    Range {
        field: &'static str,
        expected: String,
        value: String,
    },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::DateRange { .. } => "check_out",
            ValidationError::Capacity { .. } => "number_of_guests",
            ValidationError::Availability { .. } => "check_in",
            ValidationError::Transition { .. } => "status",
            ValidationError::Authorization(_) => "user",
            ValidationError::Precondition(_) => "status",
            ValidationError::Duplicate(_) => "booking",
            ValidationError::Range { field, .. } => *field,
        }
    }

    pub(crate) fn range(field: &'static str, expected: &str, value: impl ToString) -> Self {
        ValidationError::Range {
            field,
            expected: expected.to_string(),
            value: value.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::DateRange { .. }
            | ValidationError::Capacity { .. }
            | ValidationError::Range { .. } => StatusCode::BAD_REQUEST,
            ValidationError::Authorization(_) => StatusCode::FORBIDDEN,
            ValidationError::Availability { .. }
            | ValidationError::Transition { .. }
            | ValidationError::Duplicate(_) => StatusCode::CONFLICT,
            ValidationError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            AppError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(e) => e.status_code(),
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            AppError::Validation(e) => serde_json::json!({
                "error": e.to_string(),
                "field": e.field(),
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
