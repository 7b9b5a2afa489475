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

//! Authorization URL construction.

use url::Url;

/// Build the provider's authorization URL for an Authorization Code + PKCE flow.
///
/// Scopes are joined with a single space and the whole query is
/// form-encoded, so no value can leak into a neighbouring parameter.
/// `response_type=code` and `code_challenge_method=S256` are fixed.
/// Query parameters already present on `authorize_endpoint` are kept.
pub fn build_authorization_url(
    authorize_endpoint: &Url,
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    code_challenge: &str,
    state: &str,
) -> Url {
    let mut url = authorize_endpoint.clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &scopes.join(" "))
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("state", state);
    url
}
