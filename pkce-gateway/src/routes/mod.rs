/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Axum router configuration for the gateway.

pub mod diagnostics;
pub mod oauth;
pub mod session;

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    routing::{get, post},
    Router,
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::state::AppState;

/// Build the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        // OAuth flow
        .route("/login", get(oauth::login))
        .route("/callback", get(oauth::callback))
        .route("/refresh", post(oauth::refresh))
        .route("/logout", post(oauth::logout))
        // Session
        .route("/session", get(session::check_session))
        .route("/user", get(session::get_user))
        // Diagnostics
        .route("/config", get(diagnostics::config_status))
        .route("/debug", get(diagnostics::debug_info))
        .route("/health", get(diagnostics::health))
}

/// CORS policy for browser front-ends on other origins.
///
/// Credentials are allowed, so origins must be listed explicitly. With no
/// origins configured the layer answers no cross-origin requests.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Request tracing that records the method and path only.
///
/// The query string is left out: `/callback` carries the authorization
/// code and state there.
pub fn trace_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, fn(&Request<Body>) -> Span> {
    TraceLayer::new_for_http().make_span_with(request_span as fn(&Request<Body>) -> Span)
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
}
