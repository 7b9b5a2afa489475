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

//! OAuth route handlers: login, callback, refresh, logout.
//!
//! Tokens never appear in a response body. They travel only in signed
//! `HttpOnly; SameSite=Lax` cookies that browser JavaScript cannot read.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use pkce_gateway_types::{
    responses::{LogoutResponse, RefreshResponse},
    APIResponse,
};

use crate::error::AppError;
use crate::oauth::CallbackParams;
use crate::session::RequireRefreshToken;
use crate::state::AppState;

/// Where the browser goes after logging out.
pub const AFTER_LOGOUT_URL: &str = "/dashboard?logout=success";

/// `302 Found` to `location`. Axum's `Redirect` only offers 303/307/308.
fn found(location: &str) -> Result<Response, AppError> {
    let location = HeaderValue::from_str(location)
        .map_err(|_| AppError::internal("redirect location is not a valid header value"))?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// GET /login
///
/// Starts the OAuth flow: generates the PKCE pair and state, stores them in
/// signed cookies, and redirects to the provider.
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let (jar, url) = state
        .flow
        .login(jar)
        .map_err(|e| AppError::from_auth(e, !state.production))?;
    Ok((jar, found(url.as_str())?).into_response())
}

/// GET /callback?code=...&state=...
///
/// Validates the callback against the flow cookies, exchanges the code for
/// tokens, and redirects to the post-login page. The flow cookies are cleared
/// on every outcome, success or failure.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (jar, result) = state.flow.callback(jar, params).await;
    let response = result
        .map_err(|e| AppError::from_auth(e, !state.production))
        .and_then(|location| found(&location));
    match response {
        Ok(redirect) => (jar, redirect).into_response(),
        Err(err) => (jar, err).into_response(),
    }
}

/// POST /refresh
///
/// Trades the refresh-token cookie for a new access token. Any failure clears
/// both credential cookies and returns 401 `REFRESH_FAILED`.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    RequireRefreshToken(refresh_token): RequireRefreshToken,
) -> Response {
    let (jar, result) = state.flow.refresh(jar, refresh_token).await;
    match result {
        Ok(outcome) => (
            jar,
            Json(APIResponse::ok(RefreshResponse {
                expires_in: outcome.expires_in,
                expires_at: outcome.expires_at,
                scope: outcome.scope,
                refresh_token_rotated: outcome.rotated,
            })),
        )
            .into_response(),
        Err(e) => (jar, AppError::from_auth(e, !state.production)).into_response(),
    }
}

/// POST /logout -- clears every credential and flow cookie.
///
/// Succeeds whether or not a session exists.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = state.flow.logout(jar);
    (
        jar,
        Json(APIResponse::ok(LogoutResponse {
            message: "Logged out successfully".to_string(),
            redirect: AFTER_LOGOUT_URL.to_string(),
        })),
    )
}
