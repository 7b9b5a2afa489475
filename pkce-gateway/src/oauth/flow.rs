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

//! The Authorization Code + PKCE flow controller.
//!
//! ```text
//! Idle ──login──▶ FlowStarted ──(browser at provider)──▶ Redirected
//!                                                           │ callback
//!                                                           ▼
//!          FlowExpired / CsrfRejected / ExchangeFailed ◀── CallbackReceived ──▶ Authenticated
//! ```
//!
//! All flow state lives in the browser's signed cookies; the controller
//! itself holds only configuration and the token endpoint client, so any
//! number of requests may use it concurrently.

use std::fmt;
use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use url::Url;

use crate::config::OAuthConfig;
use crate::cookies::{
    CookieError, CredentialStore, Decoded, StoredAccessToken, ACCESS_TOKEN_COOKIE, ALL_COOKIES,
    FLOW_TTL_SECS, OAUTH_STATE_COOKIE, PKCE_VERIFIER_COOKIE, REFRESH_TOKEN_COOKIE,
    REFRESH_TOKEN_TTL_SECS,
};
use crate::error::AuthError;

use super::authorize::build_authorization_url;
use super::exchange::{ExchangeError, TokenEndpoint, TokenSet};
use super::pkce::FlowParameters;

/// Position of a browser session in the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    FlowStarted,
    Redirected,
    CallbackReceived,
    Authenticated,
    FlowExpired,
    CsrfRejected,
    ExchangeFailed,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowState::Idle => "idle",
            FlowState::FlowStarted => "flow_started",
            FlowState::Redirected => "redirected",
            FlowState::CallbackReceived => "callback_received",
            FlowState::Authenticated => "authenticated",
            FlowState::FlowExpired => "flow_expired",
            FlowState::CsrfRejected => "csrf_rejected",
            FlowState::ExchangeFailed => "exchange_failed",
        };
        f.write_str(name)
    }
}

impl AuthError {
    /// Terminal state a failed callback ends in.
    pub fn flow_state(&self) -> FlowState {
        match self {
            AuthError::FlowExpired => FlowState::FlowExpired,
            AuthError::CsrfRejected
            | AuthError::ProviderDenied { .. }
            | AuthError::MissingParameter(_) => FlowState::CsrfRejected,
            _ => FlowState::ExchangeFailed,
        }
    }
}

/// Query parameters the provider sends to the callback.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Result of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub expires_in: i64,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
    pub scope: String,
    /// `true` when the provider issued a new refresh token.
    pub rotated: bool,
}

/// Orchestrates PKCE generation, cookie storage and the token endpoint.
#[derive(Clone)]
pub struct OAuthFlow {
    oauth: Arc<OAuthConfig>,
    cookies: CredentialStore,
    tokens: Arc<dyn TokenEndpoint>,
}

impl OAuthFlow {
    pub fn new(oauth: Arc<OAuthConfig>, cookies: CredentialStore, tokens: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            oauth,
            cookies,
            tokens,
        }
    }

    pub fn cookies(&self) -> &CredentialStore {
        &self.cookies
    }

    /// Where the browser holding `jar` stands in the login state machine.
    ///
    /// Valid flow cookies mean the browser was sent to the provider and the
    /// callback has not arrived yet. Flow cookies that no longer verify mean
    /// the flow expired before the callback.
    pub fn observe(&self, jar: &CookieJar) -> FlowState {
        let access = self.cookies.read::<StoredAccessToken>(jar, ACCESS_TOKEN_COOKIE);
        if matches!(access, Some(Ok(ref t)) if !t.value.token.is_empty()) {
            return FlowState::Authenticated;
        }
        match (
            self.cookies.read::<String>(jar, PKCE_VERIFIER_COOKIE),
            self.cookies.read::<String>(jar, OAUTH_STATE_COOKIE),
        ) {
            (None, None) => FlowState::Idle,
            (Some(Ok(_)), Some(Ok(_))) => FlowState::Redirected,
            _ => FlowState::FlowExpired,
        }
    }

    /// `Idle → FlowStarted → Redirected`. Stores the verifier and state in two signed
    /// cookies and returns the provider URL to redirect to. No network call.
    pub fn login(&self, jar: CookieJar) -> Result<(CookieJar, Url), AuthError> {
        let params = FlowParameters::generate();

        let verifier = self
            .cookies
            .cookie(PKCE_VERIFIER_COOKIE, &params.code_verifier, FLOW_TTL_SECS)
            .map_err(cookie_failure)?;
        let state = self
            .cookies
            .cookie(OAUTH_STATE_COOKIE, &params.state, FLOW_TTL_SECS)
            .map_err(cookie_failure)?;

        let url = build_authorization_url(
            &self.oauth.auth_url,
            &self.oauth.client_id,
            &self.oauth.redirect_url,
            &self.oauth.scopes,
            &params.code_challenge,
            &params.state,
        );

        tracing::debug!(state = %FlowState::FlowStarted, "Generated PKCE verifier and state");
        tracing::info!(state = %FlowState::Redirected, "Starting OAuth flow, redirecting to provider");
        Ok((jar.add(verifier).add(state), url))
    }

    /// `CallbackReceived → Authenticated` (or a terminal failure).
    ///
    /// Checks, in order, short-circuiting on the first failure: no provider
    /// `error`; `code` present; verifier and state cookies valid; `state`
    /// matches. Only then is the code exchanged. The flow cookies are cleared
    /// on every outcome so a state value can never validate twice.
    ///
    /// On success returns the URL to send the browser to.
    pub async fn callback(
        &self,
        jar: CookieJar,
        params: CallbackParams,
    ) -> (CookieJar, Result<String, AuthError>) {
        tracing::debug!(state = %FlowState::CallbackReceived, "OAuth callback received");
        let stored_verifier = self.cookies.read::<String>(&jar, PKCE_VERIFIER_COOKIE);
        let stored_state = self.cookies.read::<String>(&jar, OAUTH_STATE_COOKIE);
        let jar = self
            .cookies
            .clear(jar, &[PKCE_VERIFIER_COOKIE, OAUTH_STATE_COOKIE]);

        let (code, verifier) = match self.validate_callback(params, stored_verifier, stored_state) {
            Ok(validated) => validated,
            Err(err) => return (jar, Err(err)),
        };

        match self.exchange_detached(code, verifier).await {
            Ok(tokens) => match self.store_tokens(jar.clone(), &tokens, None) {
                Ok((jar, _)) => {
                    tracing::info!(
                        state = %FlowState::Authenticated,
                        scope = %tokens.scope,
                        expires_in = tokens.expires_in_secs,
                        "OAuth login successful, redirecting to {}",
                        self.oauth.after_login_url
                    );
                    (jar, Ok(self.oauth.after_login_url.clone()))
                }
                Err(err) => (jar, Err(err)),
            },
            Err(err) => {
                tracing::error!(
                    state = %FlowState::ExchangeFailed,
                    retryable = err.retryable,
                    "Authorization code exchange failed: {err}"
                );
                (jar, Err(AuthError::ExchangeFailed(err)))
            }
        }
    }

    fn validate_callback(
        &self,
        params: CallbackParams,
        stored_verifier: Option<Result<Decoded<String>, CookieError>>,
        stored_state: Option<Result<Decoded<String>, CookieError>>,
    ) -> Result<(String, String), AuthError> {
        if let Some(error) = params.error {
            tracing::warn!(
                "Provider denied authorization: {error} ({})",
                params.error_description.as_deref().unwrap_or("no description")
            );
            return Err(AuthError::ProviderDenied {
                error,
                description: params.error_description,
            });
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            tracing::warn!("OAuth callback without an authorization code");
            return Err(AuthError::MissingParameter("code"));
        };

        let (verifier, expected_state) = match (stored_verifier, stored_state) {
            (Some(Ok(verifier)), Some(Ok(state))) => (verifier.value, state.value),
            (verifier, state) => {
                tracing::warn!(
                    state = %FlowState::FlowExpired,
                    verifier_cookie = describe(&verifier),
                    state_cookie = describe(&state),
                    "OAuth flow cookies missing or invalid"
                );
                return Err(AuthError::FlowExpired);
            }
        };

        let received_state = params.state.unwrap_or_default();
        if received_state.is_empty() || !self.cookies.constant_time_eq(&received_state, &expected_state) {
            tracing::error!(
                state = %FlowState::CsrfRejected,
                "OAuth state mismatch, possible CSRF attack"
            );
            return Err(AuthError::CsrfRejected);
        }

        Ok((code, verifier))
    }

    /// Run the exchange on its own task. If the inbound request is dropped the
    /// task still finishes, so the code is never left half-consumed; the
    /// result is then discarded.
    async fn exchange_detached(&self, code: String, verifier: String) -> Result<TokenSet, ExchangeError> {
        let tokens = Arc::clone(&self.tokens);
        let task = tokio::spawn(async move { tokens.exchange_code(&code, &verifier).await });
        task.await.unwrap_or_else(|e| {
            Err(ExchangeError::transient(
                None,
                format!("token exchange task failed: {e}"),
            ))
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// On success the access-token cookie is rewritten. The refresh-token
    /// cookie is rewritten with the rotated token, or with `refresh_token`
    /// again (resetting its TTL) when the provider did not rotate. On any
    /// failure every credential cookie is cleared.
    pub async fn refresh(
        &self,
        jar: CookieJar,
        refresh_token: String,
    ) -> (CookieJar, Result<RefreshOutcome, AuthError>) {
        let tokens = Arc::clone(&self.tokens);
        let previous = refresh_token.clone();
        let task = tokio::spawn(async move { tokens.refresh(&refresh_token).await });
        let result = task.await.unwrap_or_else(|e| {
            Err(ExchangeError::transient(
                None,
                format!("token refresh task failed: {e}"),
            ))
        });

        match result {
            Ok(set) => match self.store_tokens(jar.clone(), &set, Some(previous)) {
                Ok((jar, rotated)) => {
                    tracing::info!(rotated, expires_in = set.expires_in_secs, "Access token refreshed");
                    let outcome = RefreshOutcome {
                        expires_in: set.expires_in_secs,
                        expires_at: Utc::now().timestamp().saturating_add(set.expires_in_secs),
                        scope: set.scope,
                        rotated,
                    };
                    (jar, Ok(outcome))
                }
                Err(err) => (self.clear_credentials(jar), Err(err)),
            },
            Err(err) => {
                tracing::error!(
                    invalid_grant = err.is_invalid_grant(),
                    retryable = err.retryable,
                    "Token refresh failed, ending session: {err}"
                );
                (self.clear_credentials(jar), Err(AuthError::RefreshFailed(err)))
            }
        }
    }

    /// Unconditional transition to `Idle`: clears every credential and flow cookie.
    pub fn logout(&self, jar: CookieJar) -> CookieJar {
        tracing::info!(state = %FlowState::Idle, "User logged out");
        self.cookies.clear(jar, &ALL_COOKIES)
    }

    fn clear_credentials(&self, jar: CookieJar) -> CookieJar {
        self.cookies
            .clear(jar, &[ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE])
    }

    /// Write the access-token cookie (TTL = `expires_in`) and the refresh-token
    /// cookie. Returns whether a new refresh token was issued.
    fn store_tokens(
        &self,
        jar: CookieJar,
        tokens: &TokenSet,
        previous_refresh: Option<String>,
    ) -> Result<(CookieJar, bool), AuthError> {
        let access = StoredAccessToken {
            token: tokens.access_token.clone(),
            scope: tokens.scope.clone(),
        };
        let access = self
            .cookies
            .cookie(ACCESS_TOKEN_COOKIE, &access, tokens.expires_in_secs)
            .map_err(cookie_failure)?;
        let mut jar = jar.add(access);

        let rotated = tokens.refresh_token.is_some();
        if let Some(refresh) = tokens.refresh_token.as_ref().or(previous_refresh.as_ref()) {
            let cookie = self
                .cookies
                .cookie(REFRESH_TOKEN_COOKIE, refresh, REFRESH_TOKEN_TTL_SECS)
                .map_err(cookie_failure)?;
            jar = jar.add(cookie);
        }

        Ok((jar, rotated))
    }
}

fn cookie_failure(err: CookieError) -> AuthError {
    AuthError::Internal(format!("failed to build credential cookie: {err}"))
}

fn describe(cookie: &Option<Result<Decoded<String>, CookieError>>) -> &'static str {
    match cookie {
        None => "missing",
        Some(Ok(_)) => "valid",
        Some(Err(CookieError::Expired)) => "expired",
        Some(Err(_)) => "invalid",
    }
}
