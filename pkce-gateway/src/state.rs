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

//! Shared application state passed to every Axum handler via `State`.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::{Config, OAuthConfig};
use crate::cookies::CredentialStore;
use crate::oauth::{OAuthFlow, TokenEndpoint};

/// Application state shared across all request handlers.
///
/// Holds no per-user data: every session lives in the browser's cookies.
#[derive(Clone)]
pub struct AppState {
    pub flow: OAuthFlow,
    pub oauth: Arc<OAuthConfig>,
    pub cookies: CredentialStore,
    /// Client for UserInfo calls.
    pub http: reqwest::Client,
    /// Hides diagnostics and disables `/debug` when `true`.
    pub production: bool,
    pub environment: &'static str,
}

impl AppState {
    /// Build state from configuration with the given token endpoint.
    pub fn new(config: &Config, tokens: Arc<dyn TokenEndpoint>) -> Result<Self, reqwest::Error> {
        let oauth = Arc::new(config.oauth.clone());
        let cookies = CredentialStore::new(
            config.cookie_secret.as_bytes(),
            config.production,
            config.cookie_domain.clone(),
        );
        let http = reqwest::Client::builder()
            .timeout(config.token_timeout)
            .build()?;

        Ok(Self {
            flow: OAuthFlow::new(Arc::clone(&oauth), cookies.clone(), tokens),
            oauth,
            cookies,
            http,
            production: config.production,
            environment: config.environment(),
        })
    }
}

impl FromRef<AppState> for CredentialStore {
    fn from_ref(state: &AppState) -> Self {
        state.cookies.clone()
    }
}
