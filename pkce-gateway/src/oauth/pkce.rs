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

//! PKCE (RFC 7636) verifier/challenge generation and CSRF state tokens.

use std::fmt;

use oauth2::{CsrfToken, PkceCodeChallenge, PkceCodeVerifier};

/// 32 random bytes encode to a 43-character verifier (256 bits of entropy).
const VERIFIER_BYTES: u32 = 32;
/// 32 random bytes of state, well above the 128-bit floor.
const STATE_BYTES: u32 = 32;

/// Per-login flow parameters. Owned by the browser until the callback consumes them.
#[derive(Clone)]
pub struct FlowParameters {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl FlowParameters {
    /// Generate a fresh verifier, its S256 challenge, and an independent state.
    pub fn generate() -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256_len(VERIFIER_BYTES);
        Self {
            code_verifier: verifier.secret().clone(),
            code_challenge: challenge.as_str().to_string(),
            state: new_state(),
        }
    }
}

impl fmt::Debug for FlowParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowParameters")
            .field("code_verifier", &"<redacted>")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

/// New code verifier: unpadded base64url of OS-sourced random bytes.
pub fn new_verifier() -> String {
    let (_, verifier) = PkceCodeChallenge::new_random_sha256_len(VERIFIER_BYTES);
    verifier.secret().clone()
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn challenge_from(verifier: &str) -> String {
    let verifier = PkceCodeVerifier::new(verifier.to_string());
    PkceCodeChallenge::from_code_verifier_sha256(&verifier)
        .as_str()
        .to_string()
}

/// New CSRF state token, unrelated to any verifier.
pub fn new_state() -> String {
    CsrfToken::new_random_len(STATE_BYTES).secret().clone()
}
