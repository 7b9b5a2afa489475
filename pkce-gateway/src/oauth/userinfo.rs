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

//! Provider UserInfo endpoint, called with the session's bearer token.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UserInfoError {
    /// The provider rejected the bearer token (HTTP 401).
    #[error("access token rejected by the provider")]
    Unauthorized,
    #[error("{0}")]
    Failed(String),
}

/// Fetch the current user's profile from the provider, passing the
/// access token as `Authorization: Bearer`. Returns the provider JSON as-is.
pub async fn fetch_userinfo(
    http: &reqwest::Client,
    userinfo_url: &Url,
    access_token: &str,
) -> Result<serde_json::Value, UserInfoError> {
    let resp = http
        .get(userinfo_url.clone())
        .bearer_auth(access_token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| UserInfoError::Failed(format!("UserInfo request failed: {}", e.without_url())))?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(UserInfoError::Unauthorized);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UserInfoError::Failed(format!(
            "UserInfo endpoint returned HTTP {status}: {body}"
        )));
    }

    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| UserInfoError::Failed(format!("Failed to parse UserInfo response: {e}")))
}
