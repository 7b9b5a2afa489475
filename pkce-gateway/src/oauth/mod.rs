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

//! OAuth 2.1 Authorization Code + PKCE: challenge generation, authorization
//! URL construction, token endpoint calls, and the flow controller that ties
//! them to signed cookies.

pub mod authorize;
pub mod exchange;
pub mod flow;
pub mod jwt;
pub mod pkce;
pub mod userinfo;

pub use authorize::build_authorization_url;
pub use exchange::{ExchangeError, HttpTokenClient, TokenEndpoint, TokenSet};
pub use flow::{CallbackParams, FlowState, OAuthFlow, RefreshOutcome};
pub use pkce::FlowParameters;
pub use userinfo::{fetch_userinfo, UserInfoError};
