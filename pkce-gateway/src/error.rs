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

//! Error types.
//!
//! [`AuthError`] is the OAuth flow's taxonomy. [`AppError`] pairs an HTTP
//! status with an [`APIError`] body and implements Axum's `IntoResponse`;
//! every error is returned as `APIResponse<APIError>` with `success: false`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pkce_gateway_types::{APIError, APIResponse};
use thiserror::Error;

use crate::oauth::exchange::ExchangeError;

/// Why an OAuth operation did not complete.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Verifier or state cookie missing, expired, or failed verification.
    #[error("login flow expired or its cookies were tampered with")]
    FlowExpired,
    /// Callback `state` did not match the stored state. Possible CSRF attack.
    #[error("callback state does not match the stored state")]
    CsrfRejected,
    /// The provider redirected back with an `error` parameter.
    #[error("provider denied authorization: {error}")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    /// The token endpoint rejected the code or could not be reached.
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(ExchangeError),
    /// The refresh token was rejected; the session has been torn down.
    #[error("token refresh failed: {0}")]
    RefreshFailed(ExchangeError),
    #[error("no valid access token")]
    Unauthenticated,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Application-level error that pairs an HTTP status code with an [`APIError`].
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: APIError,
}

impl AppError {
    pub fn new(status: StatusCode, body: APIError) -> Self {
        Self { status, body }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, APIError::unauthorized())
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, APIError::not_found())
    }

    pub fn not_configured(feature: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, APIError::not_configured(feature))
    }

    pub fn internal(detail: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            APIError::internal_error(detail),
        )
    }

    /// Map an [`AuthError`] to a response.
    ///
    /// Provider and internal diagnostics are attached only when
    /// `expose_detail` is set (non-production).
    pub fn from_auth(err: AuthError, expose_detail: bool) -> Self {
        let detail = |body: APIError, detail: String| {
            if expose_detail {
                body.with_engineering_error(detail)
            } else {
                body
            }
        };

        match err {
            AuthError::FlowExpired => Self::new(StatusCode::BAD_REQUEST, APIError::flow_expired()),
            AuthError::CsrfRejected => {
                Self::new(StatusCode::BAD_REQUEST, APIError::csrf_rejected())
            }
            AuthError::ProviderDenied { error, description } => Self::new(
                StatusCode::BAD_REQUEST,
                APIError::provider_denied(description.as_deref().unwrap_or(&error)),
            ),
            AuthError::MissingParameter(name) => Self::new(
                StatusCode::BAD_REQUEST,
                APIError::missing_parameter(name),
            ),
            AuthError::ExchangeFailed(e) => Self::new(
                StatusCode::BAD_GATEWAY,
                detail(APIError::exchange_failed(), e.detail),
            ),
            AuthError::RefreshFailed(e) => Self::new(
                StatusCode::UNAUTHORIZED,
                detail(APIError::refresh_failed(), e.detail),
            ),
            AuthError::Unauthenticated => Self::unauthorized(),
            AuthError::Internal(msg) => {
                let body = APIError::internal_error(&msg);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    if expose_detail {
                        body
                    } else {
                        APIError {
                            engineering_error: None,
                            ..body
                        }
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = APIResponse::error(self.body);
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    /// Consume the response body and deserialize it to `APIResponse<APIError>`.
    async fn read_error_body(resp: Response) -> (StatusCode, APIResponse<APIError>) {
        let status = resp.status();
        let bytes = Body::new(resp.into_body())
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        let parsed: APIResponse<APIError> =
            serde_json::from_slice(&bytes).expect("deserialize error body");
        (status, parsed)
    }

    fn provider_failure() -> ExchangeError {
        ExchangeError::rejected(
            400,
            Some("invalid_grant".to_string()),
            "token endpoint returned HTTP 400: invalid_grant".to_string(),
        )
    }

    #[tokio::test]
    async fn unauthorized_produces_401_with_correct_code() {
        let resp = AppError::unauthorized().into_response();
        let (status, body) = read_error_body(resp).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body.success);
        assert_eq!(body.result.code, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unauthenticated_maps_to_401() {
        for expose in [false, true] {
            let resp = AppError::from_auth(AuthError::Unauthenticated, expose).into_response();
            let (status, body) = read_error_body(resp).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body.result.code, "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn validation_failures_are_400() {
        for (err, code) in [
            (AuthError::FlowExpired, "FLOW_EXPIRED"),
            (AuthError::CsrfRejected, "CSRF_REJECTED"),
            (AuthError::MissingParameter("code"), "MISSING_PARAMETER"),
            (
                AuthError::ProviderDenied {
                    error: "access_denied".to_string(),
                    description: None,
                },
                "PROVIDER_DENIED",
            ),
        ] {
            let resp = AppError::from_auth(err, true).into_response();
            let (status, body) = read_error_body(resp).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body.result.code, code);
        }
    }

    #[tokio::test]
    async fn provider_description_is_surfaced() {
        let err = AuthError::ProviderDenied {
            error: "access_denied".to_string(),
            description: Some("User cancelled".to_string()),
        };
        let (_, body) = read_error_body(AppError::from_auth(err, false).into_response()).await;
        assert!(body.result.message.contains("User cancelled"));
    }

    #[tokio::test]
    async fn exchange_failure_detail_only_outside_production() {
        let dev = AppError::from_auth(AuthError::ExchangeFailed(provider_failure()), true);
        let (status, body) = read_error_body(dev.into_response()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.result.code, "EXCHANGE_FAILED");
        assert!(body
            .result
            .engineering_error
            .as_deref()
            .unwrap()
            .contains("invalid_grant"));

        let prod = AppError::from_auth(AuthError::ExchangeFailed(provider_failure()), false);
        let (_, body) = read_error_body(prod.into_response()).await;
        assert!(body.result.engineering_error.is_none());
    }

    #[tokio::test]
    async fn refresh_failure_is_401() {
        let resp = AppError::from_auth(AuthError::RefreshFailed(provider_failure()), false)
            .into_response();
        let (status, body) = read_error_body(resp).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.result.code, "REFRESH_FAILED");
        assert!(body.result.engineering_error.is_none());
    }

    #[tokio::test]
    async fn internal_detail_is_hidden_in_production() {
        let resp = AppError::from_auth(AuthError::Internal("boom".to_string()), false)
            .into_response();
        let (status, body) = read_error_body(resp).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.result.engineering_error.is_none());
    }
}
