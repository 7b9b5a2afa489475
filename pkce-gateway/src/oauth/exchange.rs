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

//! Token endpoint calls: authorization code → tokens, and refresh.
//!
//! Both grants are single-shot. A token endpoint is not safely retryable
//! (an authorization code can be consumed by a request whose response was
//! lost), so failures are reported to the caller and never retried here.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::config::OAuthConfig;

/// Tokens issued by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    /// `None` when the provider did not issue (or rotate) a refresh token.
    pub refresh_token: Option<String>,
    /// Access token lifetime as reported by the provider. Always positive.
    pub expires_in_secs: i64,
    pub scope: String,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in_secs", &self.expires_in_secs)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A failed call to the token endpoint.
///
/// `detail` is diagnostic text for logs and non-production responses. It
/// never contains the client secret, the verifier or any token.
#[derive(Debug, Clone, Error)]
#[error("{detail}")]
pub struct ExchangeError {
    /// `false` for provider 4xx (bad/expired/used code, revoked refresh token).
    /// `true` for network errors, timeouts, 5xx and unparseable 2xx bodies.
    /// Nothing retries automatically.
    pub retryable: bool,
    pub status: Option<u16>,
    /// OAuth `error` code from the provider body, e.g. `invalid_grant`.
    pub provider_error: Option<String>,
    pub detail: String,
}

impl ExchangeError {
    pub fn rejected(status: u16, provider_error: Option<String>, detail: String) -> Self {
        Self {
            retryable: false,
            status: Some(status),
            provider_error,
            detail,
        }
    }

    pub fn transient(status: Option<u16>, detail: String) -> Self {
        Self {
            retryable: true,
            status,
            provider_error: None,
            detail,
        }
    }

    /// The grant itself is dead (expired, revoked, or already used).
    pub fn is_invalid_grant(&self) -> bool {
        self.provider_error.as_deref() == Some("invalid_grant")
    }
}

/// The provider's token endpoint.
///
/// Held behind `Arc<dyn TokenEndpoint>` so tests can substitute a fake.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// `authorization_code` grant. `code_verifier` is sent here and nowhere else.
    async fn exchange_code(&self, code: &str, code_verifier: &str)
        -> Result<TokenSet, ExchangeError>;

    /// `refresh_token` grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ExchangeError>;
}

/// Ceiling on a provider-reported access token lifetime (one year).
pub const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 60 * 60;

/// Raw successful response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Raw error response from the token endpoint (RFC 6749 §5.2).
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// [`TokenEndpoint`] over HTTPS with `reqwest`.
#[derive(Clone)]
pub struct HttpTokenClient {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    /// Include raw provider bodies in logs and diagnostics.
    verbose: bool,
}

impl HttpTokenClient {
    /// Build a client with a hard per-request `timeout`.
    pub fn new(oauth: &OAuthConfig, timeout: Duration, verbose: bool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            token_url: oauth.token_url.clone(),
            client_id: oauth.client_id.clone(),
            client_secret: oauth.client_secret.clone(),
            redirect_url: oauth.redirect_url.clone(),
            verbose,
        })
    }

    async fn request(
        &self,
        grant_type: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, ExchangeError> {
        let response = self
            .http
            .post(self.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| {
                let detail = if e.is_timeout() {
                    format!("{grant_type} request to token endpoint timed out")
                } else {
                    format!("{grant_type} request to token endpoint failed: {}", e.without_url())
                };
                tracing::error!("{detail}");
                ExchangeError::transient(None, detail)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ExchangeError::transient(
                Some(status.as_u16()),
                format!("failed to read token endpoint response: {}", e.without_url()),
            )
        })?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<TokenErrorResponse>(&body).ok();
            let provider_error = parsed.as_ref().map(|p| p.error.clone());
            let mut detail = format!("token endpoint returned HTTP {status} for {grant_type}");
            if let Some(p) = &parsed {
                detail.push_str(&format!(": {}", p.error));
                if let Some(description) = &p.error_description {
                    detail.push_str(&format!(" ({description})"));
                }
            }

            if self.verbose {
                tracing::error!("{detail}; body: {body}");
            } else {
                tracing::error!("{detail}");
            }

            return Err(if status.is_client_error() {
                ExchangeError::rejected(status.as_u16(), provider_error, detail)
            } else {
                ExchangeError {
                    provider_error,
                    ..ExchangeError::transient(Some(status.as_u16()), detail)
                }
            });
        }

        parse_token_response(status.as_u16(), &body).inspect_err(|e| {
            if self.verbose {
                tracing::error!("{}; body: {body}", e.detail);
            } else {
                tracing::error!("{}", e.detail);
            }
        })
    }
}

/// Validate a 2xx token endpoint body into a [`TokenSet`].
///
/// A body that is not a token response at all (an HTML page from a proxy,
/// truncated JSON) is transient. A well-formed token response that breaks
/// the contract (empty token, missing or non-positive `expires_in`) is not.
fn parse_token_response(status: u16, body: &str) -> Result<TokenSet, ExchangeError> {
    let raw: TokenResponse = serde_json::from_str(body).map_err(|e| {
        ExchangeError::transient(
            Some(status),
            format!("failed to parse token endpoint response: {e}"),
        )
    })?;

    let invalid = |detail: String| ExchangeError::rejected(status, None, detail);
    if raw.access_token.is_empty() {
        return Err(invalid("token endpoint response has an empty access_token".to_string()));
    }
    let expires_in_secs = match raw.expires_in {
        Some(secs) if secs > MAX_EXPIRES_IN_SECS => {
            tracing::warn!(
                expires_in = secs,
                max = MAX_EXPIRES_IN_SECS,
                "Clamping token lifetime reported by provider"
            );
            MAX_EXPIRES_IN_SECS
        }
        Some(secs) if secs > 0 => secs,
        Some(secs) => {
            return Err(invalid(format!(
                "token endpoint returned non-positive expires_in {secs}"
            )))
        }
        None => return Err(invalid("token endpoint response is missing expires_in".to_string())),
    };

    Ok(TokenSet {
        access_token: raw.access_token,
        refresh_token: raw.refresh_token.filter(|t| !t.is_empty()),
        expires_in_secs,
        scope: raw.scope.unwrap_or_default(),
    })
}

#[async_trait]
impl TokenEndpoint for HttpTokenClient {
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("code_verifier", code_verifier),
        ];
        tracing::debug!("Exchanging authorization code for tokens");
        self.request("authorization_code", &params).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ExchangeError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        tracing::debug!("Refreshing access token");
        self.request("refresh_token", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_response() {
        let set = parse_token_response(
            200,
            r#"{"access_token":"T","refresh_token":"R","expires_in":3600,"scope":"user:read","token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(set.access_token, "T");
        assert_eq!(set.refresh_token.as_deref(), Some("R"));
        assert_eq!(set.expires_in_secs, 3600);
        assert_eq!(set.scope, "user:read");
    }

    #[test]
    fn refresh_token_and_scope_are_optional() {
        let set = parse_token_response(200, r#"{"access_token":"T","expires_in":60}"#).unwrap();
        assert!(set.refresh_token.is_none());
        assert_eq!(set.scope, "");
    }

    #[test]
    fn expires_in_must_be_present_and_positive() {
        for body in [
            r#"{"access_token":"T"}"#,
            r#"{"access_token":"T","expires_in":0}"#,
            r#"{"access_token":"T","expires_in":-5}"#,
        ] {
            let err = parse_token_response(200, body).unwrap_err();
            assert!(!err.retryable, "{body}");
            assert_eq!(err.status, Some(200));
        }
    }

    #[test]
    fn huge_expires_in_is_clamped() {
        let body = format!(r#"{{"access_token":"T","expires_in":{}}}"#, i64::MAX);
        let set = parse_token_response(200, &body).unwrap();
        assert_eq!(set.expires_in_secs, MAX_EXPIRES_IN_SECS);
    }

    #[test]
    fn unparseable_body_is_retryable() {
        for body in ["<html>gateway</html>", "", r#"{"access_token":"#] {
            let err = parse_token_response(200, body).unwrap_err();
            assert!(err.retryable, "{body:?}");
            assert_eq!(err.status, Some(200));
            assert!(err.provider_error.is_none());
        }
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let err = parse_token_response(200, r#"{"access_token":"","expires_in":60}"#).unwrap_err();
        assert!(!err.retryable);
    }

    #[test]
    fn token_set_debug_is_redacted() {
        let set = TokenSet {
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            expires_in_secs: 1,
            scope: String::new(),
        };
        let rendered = format!("{set:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn invalid_grant_is_detected() {
        let err = ExchangeError::rejected(400, Some("invalid_grant".to_string()), String::new());
        assert!(err.is_invalid_grant());
        assert!(!err.retryable);
        assert!(!ExchangeError::transient(Some(503), String::new()).is_invalid_grant());
    }
}
