use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use crate::{error::Error, identity::Mode};

/// Error response: `{ "error": ..., "details"?: ... }`.
///
/// Details carry the full error chain and are only rendered in development mode.
#[derive(Debug)]
pub enum ApiError {
    Identity { error: Error, mode: Mode },
    BadRequest(String),
    NotFound,
    Forbidden,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    #[must_use]
    pub fn new(error: Error, mode: Mode) -> Self {
        Self::Identity { error, mode }
    }
}

/// HTTP status for an error, decided by its primary cause.
#[must_use]
pub fn status(error: &Error) -> StatusCode {
    match error.cause() {
        Error::InvalidCredentials
        | Error::UserNotFound
        | Error::SessionExpired
        | Error::SessionInvalid => StatusCode::UNAUTHORIZED,
        Error::NoConnectionsAvailable => StatusCode::SERVICE_UNAVAILABLE,
        Error::PasswordChangeInvalid => StatusCode::NOT_FOUND,
        Error::PasswordChangeExists | Error::UsesExternalDirectory => StatusCode::CONFLICT,
        Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
        Error::Directory(_) | Error::Mail(_) => StatusCode::BAD_GATEWAY,
        Error::UnknownRole(_)
        | Error::Database(_)
        | Error::Template(_)
        | Error::Hash(_)
        | Error::Task(_)
        | Error::Joined { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn summary(error: &Error, status: StatusCode) -> String {
    if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
        return status
            .canonical_reason()
            .unwrap_or("internal error")
            .to_lowercase();
    }
    error.cause().to_string()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Identity { error, mode } => {
                let status = status(&error);
                if status.is_server_error() {
                    error!("request failed: {error}");
                } else {
                    debug!("request rejected: {error}");
                }
                let body = ErrorBody {
                    error: summary(&error, status),
                    details: mode.is_development().then(|| error.to_string()),
                };
                (status, Json(body)).into_response()
            }
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: message,
                    details: None,
                }),
            )
                .into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}
