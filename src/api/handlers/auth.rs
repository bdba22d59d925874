//! Credential parsing and the bearer-session middleware.

use std::sync::Arc;

use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64, Encoding};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use crate::{
    api::{Service, error::ApiError},
    error::Error,
    identity::{RoleKind, Session, User},
};

/// User and session resolved from a bearer token, stored in request extensions.
#[derive(Clone, Debug)]
pub struct Authorized {
    pub user: Arc<User>,
    pub session: Session,
}

/// `Authorization: Basic base64(identity:password)`.
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<(String, SecretString)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?
        .trim();
    let decoded = Base64::decode_vec(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (identity, password) = decoded.split_once(':')?;
    if identity.is_empty() {
        return None;
    }
    Some((identity.to_string(), SecretString::from(password)))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the bearer token, slide the session and hand [`Authorized`] to the handler.
pub async fn authorize(
    Extension(service): Extension<Arc<Service>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mode = service.config().mode();
    let Some(token) = bearer_token(request.headers()) else {
        return ApiError::new(Error::SessionInvalid, mode).into_response();
    };

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match service.authenticate_session(&token, &cancel).await {
        Ok((user, session)) => {
            request.extensions_mut().insert(Authorized {
                user: Arc::new(user),
                session,
            });
            next.run(request).await
        }
        Err(err) => ApiError::new(err, mode).into_response(),
    }
}

/// Runs after [`authorize`]; rejects everyone but administrators.
pub async fn administrators_only(
    Extension(authorized): Extension<Authorized>,
    request: Request,
    next: Next,
) -> Response {
    if authorized.user.role.kind != RoleKind::Administrator {
        return ApiError::Forbidden.into_response();
    }
    next.run(request).await
}
