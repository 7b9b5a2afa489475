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

//! Shared test helpers for pkce-gateway integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{self, header, Request};
use axum::response::Response;
use axum::Router;
use axum_extra::extract::cookie::Cookie;
use http_body_util::BodyExt;
use pkce_gateway::config::Config;
use pkce_gateway::oauth::{ExchangeError, TokenEndpoint, TokenSet};
use pkce_gateway::{routes, state::AppState};
use serde::de::DeserializeOwned;
use url::Url;

pub const TEST_COOKIE_SECRET: &str = "integration-test-cookie-secret-0123456789";
pub const TEST_CLIENT_SECRET: &str = "integration-client-secret";

/// In-memory [`TokenEndpoint`] that counts calls and returns canned results.
pub struct FakeTokenEndpoint {
    pub exchange_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    exchange_response: Result<TokenSet, ExchangeError>,
    refresh_response: Result<TokenSet, ExchangeError>,
}

impl FakeTokenEndpoint {
    pub fn new(
        exchange_response: Result<TokenSet, ExchangeError>,
        refresh_response: Result<TokenSet, ExchangeError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            exchange_response,
            refresh_response,
        })
    }

    /// Issues `T`/`R` on exchange and `T2` (no rotation) on refresh.
    pub fn succeeding() -> Arc<Self> {
        Self::new(
            Ok(tokens("T", Some("R"), 3600)),
            Ok(tokens("T2", None, 1800)),
        )
    }

    pub fn exchanges(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange_code(&self, _code: &str, _verifier: &str) -> Result<TokenSet, ExchangeError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_response.clone()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, ExchangeError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_response.clone()
    }
}

pub fn tokens(access: &str, refresh: Option<&str>, expires_in_secs: i64) -> TokenSet {
    TokenSet {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in_secs,
        scope: "user:read chat:write".to_string(),
    }
}

pub fn invalid_grant() -> ExchangeError {
    ExchangeError::rejected(
        400,
        Some("invalid_grant".to_string()),
        "token endpoint returned HTTP 400 Bad Request: invalid_grant".to_string(),
    )
}

/// Configuration for tests. `extra` overrides or adds environment variables.
pub fn test_config(extra: &[(&'static str, &str)]) -> Config {
    let mut env: HashMap<&'static str, String> = HashMap::from([
        ("OAUTH_CLIENT_ID", "test-client".to_string()),
        ("OAUTH_CLIENT_SECRET", TEST_CLIENT_SECRET.to_string()),
        (
            "OAUTH_REDIRECT_URL",
            "http://localhost:3000/callback".to_string(),
        ),
        ("OAUTH_AUTH_URL", "https://id.example.com/oauth/authorize".to_string()),
        ("COOKIE_SECRET", TEST_COOKIE_SECRET.to_string()),
    ]);
    for (key, value) in extra {
        env.insert(key, value.to_string());
    }
    Config::from_lookup(|k| env.get(k).cloned()).expect("test config should load")
}

/// Build the Axum router, ready for `tower::ServiceExt::oneshot`.
pub fn build_app(config: &Config, tokens: Arc<dyn TokenEndpoint>) -> Router {
    let state = AppState::new(config, tokens).expect("build app state");
    routes::router().with_state(state)
}

/// A minimal cookie-keeping browser.
#[derive(Default, Debug, Clone)]
pub struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    /// Apply every `Set-Cookie` header of `resp`, honouring removals.
    pub fn absorb(&mut self, resp: &Response) {
        for cookie in set_cookies(resp) {
            let removed = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age.is_zero() || age.is_negative());
            if removed {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn forget(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    /// Request builder carrying the browser's cookies.
    pub fn request(&self, method: &str, uri: &str) -> http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        if self.cookies.is_empty() {
            return builder;
        }
        let header_value = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder.header(header::COOKIE, header_value)
    }

    pub fn get_request(&self, uri: &str) -> Request<Body> {
        self.request("GET", uri).body(Body::empty()).unwrap()
    }

    pub fn post_request(&self, uri: &str) -> Request<Body> {
        self.request("POST", uri).body(Body::empty()).unwrap()
    }
}

/// Parse every `Set-Cookie` header on a response.
pub fn set_cookies(resp: &Response) -> Vec<Cookie<'static>> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v.to_string()).ok())
        .collect()
}

/// The `Location` header of a redirect, parsed against a dummy base.
pub fn location(resp: &Response) -> Url {
    let raw = resp
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("ASCII Location");
    Url::parse("http://gateway.test")
        .unwrap()
        .join(raw)
        .expect("parse Location")
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Consume a response body and deserialize JSON into `T`.
pub async fn response_json<T: DeserializeOwned>(resp: Response) -> T {
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("deserialize response body")
}

/// Consume a response body as text.
pub async fn response_text(resp: Response) -> String {
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}
