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

//! Axum extractors that gate handlers on the credential cookies.
//!
//! Usage in a handler:
//! ```ignore
//! async fn profile(RequireAccessToken(session): RequireAccessToken) { ... }
//! async fn landing(OptionalAccessToken(session): OptionalAccessToken) { ... }
//! async fn refresh(RequireRefreshToken(token): RequireRefreshToken) { ... }
//! ```
//!
//! A cookie that fails signature verification or has expired is treated
//! exactly like a missing one. None of the extractors write cookies.

use std::fmt;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::cookies::{
    CookieError, CredentialStore, Decoded, StoredAccessToken, ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
};
use crate::error::{AppError, AuthError};

/// A verified, unexpired access token attached to the current request.
#[derive(Clone)]
pub struct AccessTokenContext {
    pub token: String,
    pub scope: String,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
}

impl fmt::Debug for AccessTokenContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenContext")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<Decoded<StoredAccessToken>> for AccessTokenContext {
    fn from(decoded: Decoded<StoredAccessToken>) -> Self {
        Self {
            token: decoded.value.token,
            scope: decoded.value.scope,
            expires_at: decoded.expires_at,
        }
    }
}

/// Rejects with 401 `UNAUTHORIZED` unless a valid access-token cookie is present.
#[derive(Debug, Clone)]
pub struct RequireAccessToken(pub AccessTokenContext);

/// Never rejects; `None` when no valid access-token cookie is present.
#[derive(Debug, Clone)]
pub struct OptionalAccessToken(pub Option<AccessTokenContext>);

/// Rejects with 401 `UNAUTHORIZED` unless a valid refresh-token cookie is present.
#[derive(Clone)]
pub struct RequireRefreshToken(pub String);

impl fmt::Debug for RequireRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequireRefreshToken(<redacted>)")
    }
}

/// Why a credential cookie was not usable, for logs.
fn rejection_reason<T>(read: &Option<Result<Decoded<T>, CookieError>>) -> &'static str {
    match read {
        None => "missing",
        Some(Err(CookieError::Expired)) => "expired",
        Some(Ok(_)) => "empty",
        Some(Err(_)) => "invalid",
    }
}

fn access_token<S>(parts: &Parts, state: &S) -> Result<AccessTokenContext, &'static str>
where
    CredentialStore: FromRef<S>,
{
    let store = CredentialStore::from_ref(state);
    let jar = CookieJar::from_headers(&parts.headers);
    match store.read::<StoredAccessToken>(&jar, ACCESS_TOKEN_COOKIE) {
        Some(Ok(decoded)) if !decoded.value.token.is_empty() => Ok(decoded.into()),
        other => Err(rejection_reason(&other)),
    }
}

impl<S> FromRequestParts<S> for RequireAccessToken
where
    S: Send + Sync,
    CredentialStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        access_token(parts, state).map(Self).map_err(|reason| {
            tracing::warn!(path = %parts.uri.path(), reason, "Access token required");
            AppError::from_auth(AuthError::Unauthenticated, false)
        })
    }
}

impl<S> FromRequestParts<S> for OptionalAccessToken
where
    S: Send + Sync,
    CredentialStore: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(access_token(parts, state).ok()))
    }
}

impl<S> FromRequestParts<S> for RequireRefreshToken
where
    S: Send + Sync,
    CredentialStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = CredentialStore::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        match store.read::<String>(&jar, REFRESH_TOKEN_COOKIE) {
            Some(Ok(decoded)) if !decoded.value.is_empty() => Ok(Self(decoded.value)),
            other => {
                tracing::warn!(reason = rejection_reason(&other), "Refresh token required");
                Err(AppError::from_auth(AuthError::Unauthenticated, false))
            }
        }
    }
}
