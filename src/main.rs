//! CircleUp Backend - Social API Server
//! Mission: Serve the auth/session core behind every protected route

mod auth;
mod config;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    auth::{api as auth_api, auth_middleware, AccountStore, AuthState, GoogleVerifier,
        SessionManager, TokenService},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚀 CircleUp backend starting");

    let config = Config::from_env()?;
    if config.uses_dev_secrets() {
        warn!("⚠️  Using development JWT secrets - set JWT_SECRET / JWT_REFRESH_SECRET in production!");
    }
    if config.google_client_id.trim().is_empty() {
        warn!("⚠️  GOOGLE_CLIENT_ID not set - Google sign-in disabled");
    }

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let account_store = Arc::new(AccountStore::new(&config.database_path)?);
    let token_service = Arc::new(TokenService::new(&config));
    let sessions = Arc::new(SessionManager::new(
        account_store.clone(),
        token_service.clone(),
    ));
    let google = Arc::new(GoogleVerifier::new(
        http_client,
        config.google_client_id.clone(),
        config.google_jwks_url.clone(),
    ));
    let auth_state = AuthState { sessions, google };

    info!("🔐 Account store initialized at: {}", config.database_path);

    // Public auth routes
    let public_auth = Router::new()
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/googleAuth", post(auth_api::google_auth))
        .route("/auth/refresh-token", post(auth_api::refresh_token))
        .with_state(auth_state.clone());

    // Protected auth routes (bearer access token required)
    let protected_auth = Router::new()
        .route("/auth/logout", post(auth_api::logout))
        .route("/auth/change-password", post(auth_api::change_password))
        .route_layer(middleware::from_fn_with_state(
            token_service.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(public_auth)
        .merge(protected_auth)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circleup_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    let _ = dotenv();
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "🚀 CircleUp Operational"
}
