use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorKind, LadderError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalServerError,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    pub fn forbidden() -> Self {
        ApiError::Forbidden
    }

    /// Machine readable code for the body, so the bot can branch without parsing messages
    fn code(&self) -> &'static str {
        match self {
            ApiError::InternalServerError | ApiError::DatabaseError(_) => "INTERNAL",
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => "INVALID_ARGUMENT",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unprocessable(_) => "INVALID_STATE",
            ApiError::PaymentRequired(_) => "INSUFFICIENT_FUNDS",
            ApiError::ServiceUnavailable(_) => "TRANSIENT",
        }
    }
}

impl From<LadderError> for ApiError {
    fn from(e: LadderError) -> Self {
        let msg = e.to_string();
        match e.kind() {
            ErrorKind::NotFound => ApiError::NotFound(msg),
            ErrorKind::InvalidState => ApiError::Unprocessable(msg),
            ErrorKind::Conflict => ApiError::Conflict(msg),
            ErrorKind::InsufficientFunds => ApiError::PaymentRequired(msg),
            ErrorKind::InvalidArgument => ApiError::BadRequest(msg),
            ErrorKind::Transient => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    details: Option<String>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::InternalServerError | ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::DatabaseError(_) => "Database error".to_string(),
            ApiError::ServiceUnavailable(_) => "Storage temporarily unavailable".to_string(),
            _ => self.to_string(),
        };

        let error_response = ErrorResponse {
            error: message,
            code: self.code(),
            details: Some(self.to_string()),
        };

        HttpResponse::build(self.status_code()).json(error_response)
    }
}
