use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::error::Error as StdError;
use tower::timeout::error::Elapsed;

use crate::video::ServiceError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[source] ServiceError),

    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathRejection),

    #[error("Request deadline exceeded: {0}")]
    Timeout(#[source] Elapsed),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidPath(_) => "invalid_input",
            AppError::Timeout(_) => "deadline_exceeded",
            AppError::Database(_) => "storage_failure",
            AppError::Serialization(_) => "serialization_failure",
            AppError::Unexpected(_) => "unexpected",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_)
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidTitle(_) => AppError::Validation(err),
            ServiceError::StorageFailure(_) => {
                AppError::Database(anyhow::Error::new(err).context("Failed to find videos by title"))
            }
        }
    }
}

/// Walks the `source()` chain into a single printable string.
pub(crate) fn source_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = String::new();
    let mut current = err.source();
    while let Some(cause) = current {
        chain.push_str(&format!("\n  Caused by: {}", cause));
        current = cause.source();
    }
    chain
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let causes = source_chain(&self);

        if status.is_server_error() {
            tracing::error!(
                error_kind = self.kind(),
                error = %self,
                status_code = %status,
                "Request error{}",
                causes
            );
        } else {
            tracing::warn!(
                error_kind = self.kind(),
                error = %self,
                status_code = %status,
                "Request error{}",
                causes
            );
        }

        // Internal details stay in the logs; clients only get the status.
        status.into_response()
    }
}
