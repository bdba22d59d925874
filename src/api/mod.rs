use crate::{
    api::handlers::{audit, auth, health, login, password_change, session},
    directory::LdapConnector,
    identity::Identity,
    mail::SmtpConnector,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;

pub mod error;
pub mod handlers;

/// The identity workflows wired to LDAP and SMTP.
pub type Service = Identity<LdapConnector, SmtpConnector>;

/// Routes without the shared layers.
///
/// Bearer-protected routes run [`auth::authorize`] first; the audit view also
/// requires an administrator.
pub fn routes() -> Router {
    let administrators = Router::new()
        .route("/api/audit/view", get(audit::view))
        .route_layer(middleware::from_fn(auth::administrators_only));

    let authorized = Router::new()
        .route("/api/ping", get(session::ping))
        .route("/api/session", get(session::session))
        .route("/api/logout", get(session::logout))
        .merge(administrators)
        .route_layer(middleware::from_fn(auth::authorize));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/login", get(login::login))
        .route("/api/password_change/create", post(password_change::create))
        .route(
            "/api/password_change/fulfill/{token}",
            put(password_change::fulfill),
        )
        .merge(authorized)
}

/// Full application: routes, request ids, tracing and the shared service.
pub fn router(service: Arc<Service>) -> Router {
    routes().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(service)),
    )
}

/// Serve until Ctrl-C.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(port: u16, service: Arc<Service>) -> Result<()> {
    let app = router(service);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!("http.request", method, path, request_id)
}
