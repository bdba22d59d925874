use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::valid_email;
use crate::{
    api::{Service, error::ApiError},
    error::Error,
};

#[derive(Debug, Deserialize)]
pub struct CreatePasswordChange {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillPasswordChange {
    pub new_password: SecretString,
}

/// `POST /api/password_change/create`
///
/// 201 when a token was issued and mailed, 200 when a live one already exists.
pub async fn create(
    Extension(service): Extension<Arc<Service>>,
    Json(payload): Json<CreatePasswordChange>,
) -> Result<StatusCode, ApiError> {
    let email = payload.email.trim();
    if !valid_email(email) {
        return Err(ApiError::BadRequest("invalid email".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match service.create_password_change(email, &cancel).await {
        Ok(()) => Ok(StatusCode::CREATED),
        Err(err) => match err.cause() {
            Error::PasswordChangeExists => Ok(StatusCode::OK),
            Error::UserNotFound => Err(ApiError::NotFound),
            _ => Err(ApiError::new(err, service.config().mode())),
        },
    }
}

/// `PUT /api/password_change/fulfill/{token}`
pub async fn fulfill(
    Extension(service): Extension<Arc<Service>>,
    Path(token): Path<String>,
    Json(payload): Json<FulfillPasswordChange>,
) -> Result<StatusCode, ApiError> {
    if payload.new_password.expose_secret().is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    service
        .fulfill_password_change(&token, &payload.new_password, &cancel)
        .await
        .map_err(|err| ApiError::new(err, service.config().mode()))?;

    Ok(StatusCode::OK)
}
