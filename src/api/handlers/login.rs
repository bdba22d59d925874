use std::sync::Arc;

use axum::{extract::Extension, http::HeaderMap, response::Json};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::auth::basic_credentials;
use crate::{
    api::{Service, error::ApiError},
    error::Error,
    identity::{SessionView, UserView},
};

/// Body of `GET /api/login` and `GET /api/session`.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserView,
    pub session: SessionView,
}

/// `GET /api/login` with HTTP Basic credentials.
pub async fn login(
    Extension(service): Extension<Arc<Service>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let mode = service.config().mode();
    let (identity, password) =
        basic_credentials(&headers).ok_or_else(|| ApiError::new(Error::InvalidCredentials, mode))?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let (user, session) = service
        .login(&identity, &password, &cancel)
        .await
        .map_err(|err| ApiError::new(err, mode))?;

    let session = session.view().map_err(|err| ApiError::new(err, mode))?;
    Ok(Json(SessionResponse {
        user: user.view(),
        session,
    }))
}
