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

//! PKCE gateway server entry point.
//!
//! A standalone Axum service that runs the OAuth Authorization Code + PKCE
//! flow against the provider and keeps the resulting tokens in signed
//! `HttpOnly` cookies.

use std::sync::Arc;

use pkce_gateway::config::Config;
use pkce_gateway::oauth::HttpTokenClient;
use pkce_gateway::routes;
use pkce_gateway::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("failed to load configuration");
    tracing::info!(
        environment = config.environment(),
        client_id = %config.oauth.client_id,
        redirect_uri = %config.oauth.redirect_url,
        "Loaded configuration"
    );

    let tokens = HttpTokenClient::new(&config.oauth, config.token_timeout, !config.production)
        .expect("failed to build token endpoint client");
    let state = AppState::new(&config, Arc::new(tokens)).expect("failed to build HTTP client");

    let app = routes::router()
        .layer(routes::cors_layer(&config.cors_allowed_origins))
        .layer(routes::trace_layer())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!("PKCE gateway listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {e}");
        return;
    }
    tracing::info!("Shutdown signal received");
}
