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

//! Response types for the gateway REST API.
//!
//! Every JSON endpoint returns an [`APIResponse<T>`] envelope:
//! - On success: `{ "success": true,  "result": <T> }`
//! - On failure: `{ "success": false, "result": <APIError> }`

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generic envelope
// ---------------------------------------------------------------------------

/// Top-level API response envelope.
///
/// # Success example
///
/// ```json
/// { "success": true, "result": { "expires_in": 3600, ... } }
/// ```
///
/// # Error example
///
/// ```json
/// { "success": false, "result": { "code": "REFRESH_FAILED", "message": "..." } }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIResponse<A: Serialize> {
    pub success: bool,
    pub result: A,
}

impl<A: Serialize> APIResponse<A> {
    /// Wrap a successful result.
    pub fn ok(result: A) -> Self {
        Self {
            success: true,
            result,
        }
    }
}

impl APIResponse<crate::error::APIError> {
    /// Wrap an error result.
    pub fn error(err: crate::error::APIError) -> Self {
        Self {
            success: false,
            result: err,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint-specific response payloads
// ---------------------------------------------------------------------------

/// Response payload for `POST /refresh`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshResponse {
    /// Lifetime of the new access token, as reported by the provider.
    pub expires_in: i64,
    /// Unix timestamp in seconds when the new access token expires.
    pub expires_at: i64,
    pub scope: String,
    /// `true` when the provider issued a new refresh token.
    pub refresh_token_rotated: bool,
}

/// Response payload for `POST /logout`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogoutResponse {
    pub message: String,
    /// Where the browser should navigate next.
    pub redirect: String,
}

/// Response payload for `GET /session`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionResponse {
    pub authenticated: bool,
    /// Unix timestamp in seconds when the access token expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Response payload for `GET /config`.
///
/// Reports whether the OAuth client is configured without revealing secrets.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfigStatusResponse {
    pub client_id_configured: bool,
    pub client_secret_configured: bool,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub userinfo_configured: bool,
    pub environment: String,
}

/// Presence/validity of one credential cookie, reported by `GET /debug`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CookieStatus {
    Missing,
    Valid,
    Invalid,
    Expired,
}

/// Response payload for `GET /debug` (non-production only).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DebugInfoResponse {
    pub pkce_verifier: CookieStatus,
    pub oauth_state: CookieStatus,
    pub access_token: CookieStatus,
    pub refresh_token: CookieStatus,
    /// Login state derived from the cookies, e.g. `idle`, `redirected`, `authenticated`.
    pub flow_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<i64>,
    /// Payload of the access token if it is a JWT. The signature is NOT verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unverified_token_payload: Option<serde_json::Value>,
    pub environment: String,
    /// Unix timestamp in seconds on the gateway.
    pub server_time: i64,
}

/// Response payload for `GET /health`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
}
