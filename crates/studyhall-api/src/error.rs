use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use studyhall_db::DbError;
use studyhall_types::Rejection;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The request could not be parsed into the handler's inputs.
    #[error("{message}")]
    Malformed { status: StatusCode, message: String },
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Missing or invalid credentials")]
    Unauthorized,
    #[error("Database error: {0}")]
    Database(DbError),
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Token could not be issued: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password could not be hashed: {0}")]
    PasswordHash(argon2::password_hash::Error),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Rejected(r) => Self::Rejected(r),
            other => Self::Database(other),
        }
    }
}

macro_rules! malformed_from {
    ($($rejection:ty),*) => {$(
        impl From<$rejection> for ApiError {
            fn from(r: $rejection) -> Self {
                Self::Malformed {
                    status: r.status(),
                    message: r.body_text(),
                }
            }
        }
    )*};
}

malformed_from!(JsonRejection, PathRejection, QueryRejection);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(r) => match r {
                Rejection::PermissionDenied(_) => StatusCode::FORBIDDEN,
                Rejection::NotFound(_) => StatusCode::NOT_FOUND,
                Rejection::Conflict(_) | Rejection::InvalidState(_) => StatusCode::CONFLICT,
                Rejection::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::Malformed { status, .. } => *status,
            Self::UnknownRoute(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Join(_) | Self::Token(_) | Self::PasswordHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Rejected(r) => r.reason().as_str(),
            Self::Malformed { .. } => "invalid",
            Self::UnknownRoute(_) => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Unauthorized => "unauthorized",
            _ => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: u16,
    reason: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            "internal server error".to_string()
        } else {
            warn!(error = %self, %status, "Request rejected");
            self.to_string()
        };

        let body = ErrorResponse {
            status: status.as_u16(),
            reason: self.reason(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub async fn fallback(uri: Uri) -> ApiError {
    ApiError::UnknownRoute(uri)
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
