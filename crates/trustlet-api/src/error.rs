use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use trustlet_types::api::ErrorBody;

/// Everything a workflow operation or handler can fail with. Notification
/// failures are not errors: they are reported next to a successful result.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Inviter email not found or inactive.")]
    InviterNotFound,
    #[error("This email is already registered. Please log in instead.")]
    DuplicateEmail,
    #[error("Login failed: wrong email or password.")]
    InvalidCredentials,
    #[error("Your membership has not been approved yet.")]
    NotAuthorized,
    #[error("Missing or invalid session token.")]
    Unauthenticated,
    #[error("You are not allowed to do that.")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("This invite request has already been handled.")]
    AlreadyResolved,
    #[error("Signups are closed while the beta is full.")]
    SignupsClosed,
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InviterNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEmail | AppError::AlreadyResolved => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotAuthorized | AppError::Forbidden | AppError::SignupsClosed => {
                StatusCode::FORBIDDEN
            }
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InviterNotFound => "inviter_not_found",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::NotAuthorized => "not_approved",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyResolved => "already_resolved",
            AppError::SignupsClosed => "signups_closed",
            AppError::Store(_) => "internal_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Store(e) => {
                error!("Store error: {:#}", e);
                "Something went wrong, please try again.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}
