use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::QueueStatus;

/// Error taxonomy for the queue API.
///
/// `Conflict` and `InvalidTransition` are answered like `NotFound` on the
/// wire (the caller only learns that the entry is not in the state it
/// expected), but they are kept apart here so diagnostics can tell a lost
/// race from a client ordering bug.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("invalid transition: cannot {event} an entry that is {from:?}")]
    InvalidTransition { from: QueueStatus, event: &'static str },

    #[error("entry already {status:?}")]
    Conflict { status: QueueStatus },

    #[error("storage unavailable")]
    Storage(#[from] sqlx::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound
            | ApiError::InvalidTransition { .. }
            | ApiError::Conflict { .. } => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Storage(err) = self {
            log::error!("Storage error: {err}");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}
