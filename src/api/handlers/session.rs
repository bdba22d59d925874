use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{auth::Authorized, login::SessionResponse};
use crate::api::{Service, error::ApiError};

/// `GET /api/ping`: the middleware already slid the session.
pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// `GET /api/session`
pub async fn session(
    Extension(service): Extension<Arc<Service>>,
    Extension(authorized): Extension<Authorized>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = authorized
        .session
        .view()
        .map_err(|err| ApiError::new(err, service.config().mode()))?;
    Ok(Json(SessionResponse {
        user: authorized.user.view(),
        session,
    }))
}

/// `GET /api/logout`
pub async fn logout(
    Extension(service): Extension<Arc<Service>>,
    Extension(authorized): Extension<Authorized>,
) -> Result<StatusCode, ApiError> {
    let Authorized { user, mut session } = authorized;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    service
        .logout(&user, &mut session, &cancel)
        .await
        .map_err(|err| ApiError::new(err, service.config().mode()))?;

    Ok(StatusCode::NO_CONTENT)
}
