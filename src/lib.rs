//! Commerce API Library
//!
//! This crate provides the core functionality for the commerce API:
//! catalog, orders, gateway payment reconciliation, and notifications.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<auth::AuthService>,
}

impl AppState {
    /// Builds the state container from a connected pool and configuration.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let auth_service = Arc::new(auth::AuthService::new(auth::AuthConfig::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            std::time::Duration::from_secs(config.jwt_expiration as u64),
        )));
        let services = handlers::AppServices::new(
            db.clone(),
            auth_service.clone(),
            config.gateway.clone(),
        );
        Self {
            db,
            config,
            services,
            auth: auth_service,
        }
    }
}

/// Versioned API surface
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Orders
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/update_status",
            patch(handlers::orders::update_order_status),
        )
        // Payments; the webhook stays tokenless and is verified by signature
        .route(
            "/payments/initiate/:order_id",
            post(handlers::payments::initiate_payment),
        )
        .route(
            "/payments/webhook",
            post(handlers::payments::payment_webhook),
        )
        // Shipping addresses
        .route(
            "/addresses",
            get(handlers::shipping_addresses::list_addresses)
                .post(handlers::shipping_addresses::create_address),
        )
        .route(
            "/addresses/:id",
            get(handlers::shipping_addresses::get_address)
                .put(handlers::shipping_addresses::update_address)
                .delete(handlers::shipping_addresses::delete_address),
        )
        // Catalog
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // Stock notifications
        .route(
            "/stock-notifications",
            get(handlers::stock_notifications::list_subscriptions)
                .post(handlers::stock_notifications::subscribe),
        )
        // In-app notifications
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::notifications::mark_notification_read),
        )
        // Admin role management
        .route("/users/make-admin", post(handlers::users::make_admin))
        .route("/users/revoke-admin", post(handlers::users::revoke_admin))
}

/// Registration and login
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/me", get(handlers::auth::me))
}

/// Assembles the full application router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors_layer_from_config(&state.config);

    Router::new()
        .route("/", get(|| async { "commerce-api up" }))
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", auth_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing for request/response telemetry
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        // Validate bearer tokens and stash the AuthUser for extractors
        .layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            auth::auth_middleware,
        ))
        .with_state(state)
}

fn cors_layer_from_config(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::permissive()
    }
}

async fn api_status() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    Json(json!({
        "status": "ok",
        "version": version,
        "service": "commerce-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
