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

//! Configuration health, development debug info, and liveness.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use pkce_gateway_types::{
    responses::{ConfigStatusResponse, CookieStatus, DebugInfoResponse, HealthResponse},
    APIResponse,
};
use serde::de::DeserializeOwned;

use crate::cookies::{
    CookieError, CredentialStore, Decoded, StoredAccessToken, ACCESS_TOKEN_COOKIE,
    OAUTH_STATE_COOKIE, PKCE_VERIFIER_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::error::AppError;
use crate::oauth::jwt::decode_payload_unverified;
use crate::state::AppState;

/// Characters shown at each end of a token preview.
const PREVIEW_CHARS: usize = 6;

/// GET /config -- reports whether the OAuth client is configured. No secrets.
pub async fn config_status(State(state): State<AppState>) -> Json<APIResponse<ConfigStatusResponse>> {
    let oauth = &state.oauth;
    Json(APIResponse::ok(ConfigStatusResponse {
        client_id_configured: !oauth.client_id.is_empty(),
        client_secret_configured: !oauth.client_secret.is_empty(),
        redirect_uri: oauth.redirect_url.clone(),
        scopes: oauth.scopes.clone(),
        userinfo_configured: oauth.userinfo_url.is_some(),
        environment: state.environment.to_string(),
    }))
}

/// GET /debug -- cookie diagnostics. 404 in production.
///
/// The token payload shown here is decoded without verifying its signature
/// and is for display only.
pub async fn debug_info(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<APIResponse<DebugInfoResponse>>, AppError> {
    if state.production {
        return Err(AppError::not_found());
    }

    let store = &state.cookies;
    let access = store.read::<StoredAccessToken>(&jar, ACCESS_TOKEN_COOKIE);
    let access_token = access.as_ref().and_then(|r| r.as_ref().ok());

    Ok(Json(APIResponse::ok(DebugInfoResponse {
        pkce_verifier: status_of::<String>(store, &jar, PKCE_VERIFIER_COOKIE),
        oauth_state: status_of::<String>(store, &jar, OAUTH_STATE_COOKIE),
        access_token: status(&access),
        refresh_token: status_of::<String>(store, &jar, REFRESH_TOKEN_COOKIE),
        flow_state: state.flow.observe(&jar).to_string(),
        access_token_preview: access_token.map(|t| preview(&t.value.token)),
        access_token_expires_at: access_token.map(|t| t.expires_at),
        unverified_token_payload: access_token
            .and_then(|t| decode_payload_unverified(&t.value.token)),
        environment: state.environment.to_string(),
        server_time: Utc::now().timestamp(),
    })))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn status_of<T: DeserializeOwned>(store: &CredentialStore, jar: &CookieJar, name: &str) -> CookieStatus {
    status(&store.read::<T>(jar, name))
}

fn status<T>(read: &Option<Result<Decoded<T>, CookieError>>) -> CookieStatus {
    match read {
        None => CookieStatus::Missing,
        Some(Ok(_)) => CookieStatus::Valid,
        Some(Err(CookieError::Expired)) => CookieStatus::Expired,
        Some(Err(_)) => CookieStatus::Invalid,
    }
}

/// First and last few characters of a token. Short tokens are fully masked.
fn preview(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= PREVIEW_CHARS * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..PREVIEW_CHARS].iter().collect();
    let tail: String = chars[chars.len() - PREVIEW_CHARS..].iter().collect();
    format!("{head}...{tail}")
}
