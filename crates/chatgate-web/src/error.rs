use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chatgate_core::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    RateLimited { message: String, retry_after_secs: u64 },
    /// No usable bearer token was presented.
    MissingCredentials(String),
    /// A token was presented but failed verification, or credentials were wrong.
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, message) = match self {
            AppError::RateLimited { message, retry_after_secs } => {
                retry_after = Some(retry_after_secs);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::MissingCredentials(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        let message = e.to_string();
        match e {
            CoreError::RateLimited { retry_after_secs } => AppError::RateLimited {
                message,
                retry_after_secs,
            },
            e if e.is_auth_failure() => AppError::Forbidden(message),
            CoreError::UserExists => {
                AppError::Conflict("User with this email/username already exists".to_string())
            }
            CoreError::UserNotFound => AppError::NotFound("No such user".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", e);
        AppError::Internal("Internal server error".to_string())
    }
}
