//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod audit;
mod auth;
mod integrations;
mod risk;
mod services;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware_stack = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Routes reachable without a token
    let public = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login));

    // Everything else requires a valid bearer token; role checks happen
    // inside the handlers.
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        // Service catalog
        .route(
            "/api/services",
            get(services::list_services).post(services::create_service),
        )
        .route("/api/services/dependencies", get(services::list_dependencies))
        .route(
            "/api/services/{id}",
            put(services::update_service).delete(services::delete_service),
        )
        .route(
            "/api/services/{id}/status",
            post(services::update_status).put(services::update_status),
        )
        .route(
            "/api/services/{id}/bia",
            put(services::upsert_bia).delete(services::delete_bia),
        )
        .route(
            "/api/services/{id}/downtime",
            post(services::record_downtime).get(services::list_downtime),
        )
        .route("/api/services/{id}/health", get(services::service_health))
        // Integrations
        .route(
            "/api/integrations",
            post(integrations::create_integration).get(integrations::list_integrations),
        )
        // Risk
        .route("/api/risk/{service_id}", get(risk::get_risk))
        .route("/api/risk/{service_id}/save", post(risk::save_risk))
        .route(
            "/api/risk/{service_id}/manual",
            post(risk::create_manual_risk).put(risk::update_manual_risk),
        )
        // Audit trail
        .route("/api/audit", get(audit::list_audit))
        .route_layer(middleware::from_fn(auth_middleware));

    // Build the router
    Router::new()
        .route("/health", get(health_check))
        .merge(public)
        .merge(protected)
        .layer(middleware_stack)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
