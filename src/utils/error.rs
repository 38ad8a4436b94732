use crate::database::StoreError;
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use log::warn;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("Unauthenticated: {0}")]
    UnauthenticatedError(String),

    #[error("Forbidden: {0}")]
    ForbiddenError(String),

    #[error("Invalid Input: {0}")]
    InvalidInputError(String),

    #[error("Not Found: {0}")]
    NotFoundError(String),

    #[error("Poll Closed: {0}")]
    PollClosedError(String),

    #[error("Store Unavailable: {0}")]
    StoreUnavailableError(String),
}

impl From<StoreError> for CustomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                CustomError::NotFoundError(format!("{} record {} not found", collection, id))
            }
            other => CustomError::StoreUnavailableError(other.to_string()),
        }
    }
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match *self {
            CustomError::UnauthenticatedError(..) => StatusCode::UNAUTHORIZED,
            CustomError::ForbiddenError(..) => StatusCode::FORBIDDEN,
            CustomError::InvalidInputError(..) => StatusCode::BAD_REQUEST,
            CustomError::NotFoundError(..) => StatusCode::NOT_FOUND,
            CustomError::PollClosedError(..) => StatusCode::CONFLICT,
            CustomError::StoreUnavailableError(..) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = json!({
            "success": false,
            "message": self.to_string(),
            "httpStatusCode": self.status_code().as_u16(),
            "error": match *self {
                CustomError::UnauthenticatedError(..) => "UNAUTHENTICATED_ERROR",
                CustomError::ForbiddenError(..) => "FORBIDDEN_ERROR",
                CustomError::InvalidInputError(..) => "INVALID_INPUT_ERROR",
                CustomError::NotFoundError(..) => "NOT_FOUND_ERROR",
                CustomError::PollClosedError(..) => "POLL_CLOSED_ERROR",
                CustomError::StoreUnavailableError(..) => "STORE_UNAVAILABLE_ERROR",
            },
            "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
        });

        HttpResponse::build(self.status_code()).json(error_message)
    }
}

/// Swallow a store failure at the request boundary.
///
/// A failed write or read is logged and reported back as `Ok(None)`, so the
/// caller renders whatever the next reload shows instead of an error. Every
/// other error is passed through untouched.
pub fn tolerate_store_failure<T>(
    operation: &str,
    result: Result<T, CustomError>,
) -> Result<Option<T>, CustomError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CustomError::StoreUnavailableError(reason)) => {
            warn!("{} failed, treating as no-op: {}", operation, reason);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
