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

//! Shared API types for the PKCE credential gateway.
//!
//! This crate defines the JSON contract between the gateway and the
//! browser client that calls it. It is intentionally framework-agnostic:
//! no axum, no HTTP client, no crypto.

pub mod error;
pub mod responses;

pub use error::APIError;
pub use responses::APIResponse;
