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

//! Session route handlers: session status and the provider profile proxy.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use pkce_gateway_types::{responses::SessionResponse, APIError, APIResponse};

use crate::cookies::ACCESS_TOKEN_COOKIE;
use crate::error::{AppError, AuthError};
use crate::oauth::{fetch_userinfo, UserInfoError};
use crate::session::{OptionalAccessToken, RequireAccessToken};
use crate::state::AppState;

/// GET /session -- reports whether the browser holds a valid access token.
/// Never 401.
pub async fn check_session(
    OptionalAccessToken(session): OptionalAccessToken,
) -> Json<APIResponse<SessionResponse>> {
    let result = match session {
        Some(ctx) => SessionResponse {
            authenticated: true,
            expires_at: Some(ctx.expires_at),
            scope: Some(ctx.scope),
        },
        None => SessionResponse {
            authenticated: false,
            expires_at: None,
            scope: None,
        },
    };
    Json(APIResponse::ok(result))
}

/// GET /user -- the provider's profile for the current access token.
///
/// If the provider rejects the token the access-token cookie is cleared so
/// the client knows to refresh.
pub async fn get_user(
    State(state): State<AppState>,
    jar: CookieJar,
    RequireAccessToken(session): RequireAccessToken,
) -> Result<Response, AppError> {
    let userinfo_url = state
        .oauth
        .userinfo_url
        .as_ref()
        .ok_or_else(|| AppError::not_configured("userinfo endpoint"))?;

    match fetch_userinfo(&state.http, userinfo_url, &session.token).await {
        Ok(profile) => Ok(Json(APIResponse::ok(profile)).into_response()),
        Err(UserInfoError::Unauthorized) => {
            tracing::warn!("Provider rejected access token on UserInfo, clearing cookie");
            let jar = state.cookies.clear(jar, &[ACCESS_TOKEN_COOKIE]);
            Ok((jar, AppError::from_auth(AuthError::Unauthenticated, false)).into_response())
        }
        Err(UserInfoError::Failed(detail)) => {
            let body = if state.production {
                tracing::error!("UserInfo request failed");
                APIError::upstream_error()
            } else {
                tracing::error!("UserInfo request failed: {detail}");
                APIError::upstream_error().with_engineering_error(detail)
            };
            Err(AppError::new(StatusCode::BAD_GATEWAY, body))
        }
    }
}
