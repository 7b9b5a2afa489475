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

//! Application configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::time::Duration;

use url::Url;

const DEFAULT_AUTH_URL: &str = "https://id.kick.com/oauth/authorize";
const DEFAULT_TOKEN_URL: &str = "https://id.kick.com/oauth/token";
const DEFAULT_SCOPES: &str =
    "user:read channel:read channel:write chat:write streamkey:read events:subscribe moderation:ban";
const DEFAULT_AFTER_LOGIN_URL: &str = "/dashboard?auth=success";

/// HMAC keys shorter than this are rejected at start-up.
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

/// Token endpoint timeout bounds, in seconds.
const MIN_TOKEN_TIMEOUT_SECS: u64 = 10;
const MAX_TOKEN_TIMEOUT_SECS: u64 = 15;

/// Configuration for the gateway.
#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:3000").
    pub listen_addr: String,
    pub oauth: OAuthConfig,
    /// Key used to sign every credential cookie.
    pub cookie_secret: String,
    /// Cookie domain (optional, e.g. ".example.com").
    pub cookie_domain: Option<String>,
    /// `true` when `APP_ENV=production`. Enables `Secure` cookies and hides
    /// provider diagnostics from responses.
    pub production: bool,
    /// Hard timeout for calls to the provider's token endpoint.
    pub token_timeout: Duration,
    /// Browser origins allowed to call the gateway with credentials.
    /// Empty disables cross-origin access.
    pub cors_allowed_origins: Vec<String>,
}

/// OAuth client registration with the provider.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must byte-for-byte match the redirect URI registered with the provider.
    pub redirect_url: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub userinfo_url: Option<Url>,
    /// Requested scopes, in the order they are sent to the provider.
    pub scopes: Vec<String>,
    /// Where the browser lands after a successful callback.
    pub after_login_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required
    /// - `OAUTH_CLIENT_ID`, `OAUTH_CLIENT_SECRET`, `OAUTH_REDIRECT_URL`
    /// - `COOKIE_SECRET` (at least 32 bytes)
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:3000"`)
    /// - `OAUTH_AUTH_URL`, `OAUTH_TOKEN_URL`, `OAUTH_USERINFO_URL`
    /// - `OAUTH_SCOPES` (space or comma separated)
    /// - `COOKIE_DOMAIN`, `APP_ENV`, `AFTER_LOGIN_URL`, `TOKEN_TIMEOUT_SECS`
    /// - `CORS_ALLOWED_ORIGINS` (space or comma separated)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or(format!("{key} environment variable is required"));

        let client_id = required("OAUTH_CLIENT_ID")?;
        let client_secret = required("OAUTH_CLIENT_SECRET")?;
        let redirect_url = required("OAUTH_REDIRECT_URL")?;
        Url::parse(&redirect_url).map_err(|e| format!("OAUTH_REDIRECT_URL is not a valid URL: {e}"))?;

        let cookie_secret = required("COOKIE_SECRET")?;
        if cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(format!(
                "COOKIE_SECRET must be at least {MIN_COOKIE_SECRET_LEN} bytes"
            ));
        }

        let auth_url = parse_url("OAUTH_AUTH_URL", var("OAUTH_AUTH_URL"), DEFAULT_AUTH_URL)?;
        let token_url = parse_url("OAUTH_TOKEN_URL", var("OAUTH_TOKEN_URL"), DEFAULT_TOKEN_URL)?;
        let userinfo_url = var("OAUTH_USERINFO_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| format!("OAUTH_USERINFO_URL is not a valid URL: {e}"))
            })
            .transpose()?;

        let scopes = parse_scopes(&var("OAUTH_SCOPES").unwrap_or_else(|| DEFAULT_SCOPES.to_string()));
        if scopes.is_empty() {
            return Err("OAUTH_SCOPES must name at least one scope".to_string());
        }

        let token_timeout_secs = var("TOKEN_TIMEOUT_SECS")
            .unwrap_or_else(|| MAX_TOKEN_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "TOKEN_TIMEOUT_SECS must be a valid integer")?
            .clamp(MIN_TOKEN_TIMEOUT_SECS, MAX_TOKEN_TIMEOUT_SECS);

        let production = var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            oauth: OAuthConfig {
                client_id,
                client_secret,
                redirect_url,
                auth_url,
                token_url,
                userinfo_url,
                scopes,
                after_login_url: var("AFTER_LOGIN_URL")
                    .unwrap_or_else(|| DEFAULT_AFTER_LOGIN_URL.to_string()),
            },
            cookie_secret,
            cookie_domain: var("COOKIE_DOMAIN"),
            production,
            token_timeout: Duration::from_secs(token_timeout_secs),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_scopes(&raw))
                .unwrap_or_default(),
        })
    }

    /// Name of the running environment, as reported by diagnostic endpoints.
    pub fn environment(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }
}

fn parse_url(key: &str, value: Option<String>, default: &str) -> Result<Url, String> {
    let raw = value.unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| format!("{key} is not a valid URL: {e}"))
}

/// Split a scope (or origin) list on whitespace and commas, keeping order
/// and dropping blanks.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("oauth", &self.oauth)
            .field("cookie_secret", &"<redacted>")
            .field("cookie_domain", &self.cookie_domain)
            .field("production", &self.production)
            .field("token_timeout", &self.token_timeout)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("userinfo_url", &self.userinfo_url.as_ref().map(Url::as_str))
            .field("scopes", &self.scopes)
            .field("after_login_url", &self.after_login_url)
            .finish()
    }
}
