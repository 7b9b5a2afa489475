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

//! API error types.
//!
//! Every failed API response is returned as `APIResponse<APIError>` with `success: false`.

use serde::{Deserialize, Serialize};

/// Structured error returned in the `result` field of a failed [`super::APIResponse`].
///
/// The `code` field is a machine-readable identifier (e.g. `"CSRF_REJECTED"`).
/// The `message` field is a human-readable description suitable for display.
/// The `engineering_error` field carries provider diagnostics that are useful
/// during development but must be omitted in production.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIError {
    /// Machine-readable error code (e.g. `"UNAUTHORIZED"`, `"FLOW_EXPIRED"`).
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional engineering-level detail for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineering_error: Option<String>,
}

impl APIError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            engineering_error: None,
        }
    }

    /// Attach engineering detail. Callers decide whether detail may be exposed.
    pub fn with_engineering_error(mut self, detail: impl Into<String>) -> Self {
        self.engineering_error = Some(detail.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "Authentication required.")
    }

    pub fn flow_expired() -> Self {
        Self::new(
            "FLOW_EXPIRED",
            "The login attempt expired or was tampered with. Please log in again.",
        )
    }

    pub fn csrf_rejected() -> Self {
        Self::new(
            "CSRF_REJECTED",
            "The login response did not match this browser session. Please log in again.",
        )
    }

    pub fn provider_denied(reason: &str) -> Self {
        Self::new("PROVIDER_DENIED", format!("Authorization denied: {reason}"))
    }

    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            "MISSING_PARAMETER",
            format!("Required parameter '{name}' is missing"),
        )
    }

    pub fn exchange_failed() -> Self {
        Self::new(
            "EXCHANGE_FAILED",
            "Could not obtain an access token. Please log in again.",
        )
    }

    pub fn refresh_failed() -> Self {
        Self::new(
            "REFRESH_FAILED",
            "The session could not be refreshed. Please log in again.",
        )
    }

    pub fn not_configured(feature: &str) -> Self {
        Self::new("NOT_CONFIGURED", format!("{feature} is not configured"))
    }

    pub fn not_found() -> Self {
        Self::new("NOT_FOUND", "Not found")
    }

    pub fn upstream_error() -> Self {
        Self::new("UPSTREAM_ERROR", "The platform API request failed")
    }

    pub fn internal_error(detail: &str) -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error").with_engineering_error(detail)
    }
}

impl std::fmt::Display for APIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for APIError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engineering_error_is_omitted_when_absent() {
        let json = serde_json::to_value(APIError::csrf_rejected()).unwrap();
        assert_eq!(json["code"], "CSRF_REJECTED");
        assert!(json.get("engineering_error").is_none());
    }

    #[test]
    fn provider_reason_is_part_of_the_message() {
        let err = APIError::provider_denied("access_denied");
        assert_eq!(err.code, "PROVIDER_DENIED");
        assert!(err.message.contains("access_denied"));
        assert_eq!(err.to_string(), format!("[PROVIDER_DENIED] {}", err.message));
    }
}
