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

//! Signed credential cookies.
//!
//! A cookie value is `BASE64URL(payload) "." BASE64URL(HMAC-SHA256(name, payload))`
//! where the payload is `{"exp": <unix secs>, "val": <value>}`. The cookie name
//! is part of the MAC input, so a value signed for `refresh_token` cannot be
//! replayed as `access_token`. The expiry inside the signed payload is enforced
//! independently of the browser's `Max-Age` handling.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const PKCE_VERIFIER_COOKIE: &str = "pkce_verifier";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Every cookie the gateway may set, in the order logout clears them.
pub const ALL_COOKIES: [&str; 4] = [
    ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    PKCE_VERIFIER_COOKIE,
    OAUTH_STATE_COOKIE,
];

/// Lifetime of the verifier and state cookies.
pub const FLOW_TTL_SECS: i64 = 10 * 60;
/// Lifetime of the refresh-token cookie. Policy, not provider-supplied.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Why a cookie could not be used.
///
/// Signature failures are deliberately uniform: a wrong key, a truncated
/// value and a flipped bit all produce [`CookieError::InvalidSignature`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CookieError {
    #[error("invalid cookie signature")]
    InvalidSignature,
    #[error("cookie expired")]
    Expired,
    #[error("cookie payload could not be serialized")]
    Serialize,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    exp: i64,
    val: T,
}

/// A verified cookie value together with the expiry it was signed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub value: T,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
}

/// Payload of the `access_token` cookie.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredAccessToken {
    pub token: String,
    pub scope: String,
}

impl std::fmt::Debug for StoredAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredAccessToken")
            .field("token", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Signs, verifies, and attaches credential cookies.
#[derive(Clone)]
pub struct CredentialStore {
    key: Arc<[u8]>,
    secure: bool,
    domain: Option<String>,
}

impl CredentialStore {
    /// `secure` sets the `Secure` attribute (production). `domain` is optional.
    pub fn new(secret: &[u8], secure: bool, domain: Option<String>) -> Self {
        Self {
            key: Arc::from(secret),
            secure,
            domain,
        }
    }

    fn mac(&self, name: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(name.as_bytes());
        mac.update(&[0]);
        mac
    }

    /// Serialize and sign `value` for the cookie `name`, valid for `ttl_secs`.
    pub fn encode<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        ttl_secs: i64,
    ) -> Result<String, CookieError> {
        let envelope = Envelope {
            exp: Utc::now().timestamp().saturating_add(ttl_secs),
            val: value,
        };
        let json = serde_json::to_vec(&envelope).map_err(|_| CookieError::Serialize)?;
        let body = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac(name);
        mac.update(body.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{body}.{signature}"))
    }

    /// Verify and deserialize a cookie value previously produced by [`encode`](Self::encode).
    ///
    /// The MAC is checked in constant time before the payload is parsed.
    pub fn decode<T: DeserializeOwned>(
        &self,
        name: &str,
        cookie_value: &str,
    ) -> Result<Decoded<T>, CookieError> {
        let (body, signature) = cookie_value
            .rsplit_once('.')
            .ok_or(CookieError::InvalidSignature)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CookieError::InvalidSignature)?;

        let mut mac = self.mac(name);
        mac.update(body.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CookieError::InvalidSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CookieError::InvalidSignature)?;
        let envelope: Envelope<T> =
            serde_json::from_slice(&json).map_err(|_| CookieError::InvalidSignature)?;

        if envelope.exp <= Utc::now().timestamp() {
            return Err(CookieError::Expired);
        }

        Ok(Decoded {
            value: envelope.val,
            expires_at: envelope.exp,
        })
    }

    /// Read and verify cookie `name` from `jar`. `None` if the cookie is absent.
    pub fn read<T: DeserializeOwned>(
        &self,
        jar: &CookieJar,
        name: &str,
    ) -> Option<Result<Decoded<T>, CookieError>> {
        jar.get(name).map(|cookie| self.decode(name, cookie.value()))
    }

    /// Build a signed `HttpOnly; SameSite=Lax` cookie with `Max-Age=ttl_secs`.
    pub fn cookie<T: Serialize>(
        &self,
        name: &'static str,
        value: &T,
        ttl_secs: i64,
    ) -> Result<Cookie<'static>, CookieError> {
        let encoded = self.encode(name, value, ttl_secs)?;
        Ok(self.with_attributes(Cookie::new(name, encoded), ttl_secs))
    }

    /// Build a cookie that tells the browser to delete `name`.
    pub fn removal(&self, name: &'static str) -> Cookie<'static> {
        self.with_attributes(Cookie::new(name, ""), 0)
    }

    /// Add a removal cookie for each of `names`.
    pub fn clear(&self, mut jar: CookieJar, names: &[&'static str]) -> CookieJar {
        for name in names {
            jar = jar.add(self.removal(*name));
        }
        jar
    }

    fn with_attributes(&self, mut cookie: Cookie<'static>, ttl_secs: i64) -> Cookie<'static> {
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        cookie.set_max_age(time::Duration::seconds(ttl_secs.max(0)));
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }

    /// Compare two secrets without leaking the position of the first difference.
    ///
    /// Both inputs are MACed under the cookie key and the fixed-length tags
    /// are compared with the constant-time check from `hmac`.
    pub fn constant_time_eq(&self, a: &str, b: &str) -> bool {
        let mut left = self.mac("compare");
        left.update(a.as_bytes());
        let tag = left.finalize().into_bytes();

        let mut right = self.mac("compare");
        right.update(b.as_bytes());
        right.verify_slice(&tag).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn store() -> CredentialStore {
        CredentialStore::new(SECRET, false, None)
    }

    #[test]
    fn round_trips_strings_and_structs() {
        let store = store();
        let encoded = store.encode(OAUTH_STATE_COOKIE, &"state-value".to_string(), 60).unwrap();
        let decoded: Decoded<String> = store.decode(OAUTH_STATE_COOKIE, &encoded).unwrap();
        assert_eq!(decoded.value, "state-value");

        let token = StoredAccessToken {
            token: "tok; with=odd,chars \"quoted\"".to_string(),
            scope: "user:read chat:write".to_string(),
        };
        let encoded = store.encode(ACCESS_TOKEN_COOKIE, &token, 3600).unwrap();
        let decoded: Decoded<StoredAccessToken> = store.decode(ACCESS_TOKEN_COOKIE, &encoded).unwrap();
        assert_eq!(decoded.value, token);
        let now = Utc::now().timestamp();
        assert!((now + 3598..=now + 3600).contains(&decoded.expires_at));
    }

    #[test]
    fn encoded_value_is_cookie_safe() {
        let encoded = store()
            .encode(ACCESS_TOKEN_COOKIE, &"a;b c,\"d\"\\".to_string(), 60)
            .unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
    }

    #[test]
    fn every_single_bit_mutation_is_rejected() {
        let store = store();
        let encoded = store.encode(REFRESH_TOKEN_COOKIE, &"refresh-abc".to_string(), 600).unwrap();

        for index in 0..encoded.len() {
            for bit in 0..8 {
                let mut bytes = encoded.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                let Ok(mutated) = String::from_utf8(bytes) else {
                    continue;
                };
                let result = store.decode::<String>(REFRESH_TOKEN_COOKIE, &mutated);
                assert_eq!(
                    result.unwrap_err(),
                    CookieError::InvalidSignature,
                    "mutation at byte {index} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn wrong_secret_fails() {
        let encoded = store().encode(OAUTH_STATE_COOKIE, &"s".to_string(), 60).unwrap();
        let other = CredentialStore::new(b"another-secret-another-secret-00", false, None);
        assert_eq!(
            other.decode::<String>(OAUTH_STATE_COOKIE, &encoded).unwrap_err(),
            CookieError::InvalidSignature
        );
    }

    #[test]
    fn truncated_value_fails() {
        let store = store();
        let encoded = store.encode(OAUTH_STATE_COOKIE, &"s".to_string(), 60).unwrap();
        for len in [0, 1, encoded.len() / 2, encoded.len() - 1] {
            assert_eq!(
                store.decode::<String>(OAUTH_STATE_COOKIE, &encoded[..len]).unwrap_err(),
                CookieError::InvalidSignature
            );
        }
    }

    #[test]
    fn value_signed_for_one_cookie_is_rejected_under_another_name() {
        let store = store();
        let encoded = store.encode(REFRESH_TOKEN_COOKIE, &"r".to_string(), 60).unwrap();
        assert_eq!(
            store.decode::<String>(ACCESS_TOKEN_COOKIE, &encoded).unwrap_err(),
            CookieError::InvalidSignature
        );
    }

    #[test]
    fn expired_value_is_rejected() {
        let store = store();
        let encoded = store.encode(PKCE_VERIFIER_COOKIE, &"v".to_string(), -1).unwrap();
        assert_eq!(
            store.decode::<String>(PKCE_VERIFIER_COOKIE, &encoded).unwrap_err(),
            CookieError::Expired
        );
    }

    #[test]
    fn extreme_ttl_saturates_instead_of_overflowing() {
        let store = store();
        let encoded = store.encode(PKCE_VERIFIER_COOKIE, &"v".to_string(), i64::MAX).unwrap();
        let decoded = store.decode::<String>(PKCE_VERIFIER_COOKIE, &encoded).unwrap();
        assert_eq!(decoded.expires_at, i64::MAX);

        let cookie = store.cookie(PKCE_VERIFIER_COOKIE, &"v".to_string(), i64::MAX).unwrap();
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(i64::MAX)));
    }

    #[test]
    fn cookie_carries_security_attributes() {
        let secure = CredentialStore::new(SECRET, true, Some("example.com".to_string()));
        let cookie = secure.cookie(OAUTH_STATE_COOKIE, &"s".to_string(), FLOW_TTL_SECS).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(FLOW_TTL_SECS)));

        let insecure = store().cookie(OAUTH_STATE_COOKIE, &"s".to_string(), 60).unwrap();
        assert_eq!(insecure.secure(), Some(false));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = store().removal(ACCESS_TOKEN_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }

    #[test]
    fn constant_time_eq_compares_contents() {
        let store = store();
        assert!(store.constant_time_eq("abc", "abc"));
        assert!(!store.constant_time_eq("abc", "abd"));
        assert!(!store.constant_time_eq("abc", "abcd"));
        assert!(!store.constant_time_eq("", "a"));
    }
}
