//! Integration route handlers
//!
//! Attach external integrations (AWS, Slack, ...) to services. A high
//! integration count feeds the risk scorer's complexity rule.

use crate::auth::{require_role, Claims, Role};
use crate::error::{not_found_error, AppError};
use crate::models::Integration;
use crate::state::SharedState;
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct IntegrationRequest {
    pub service_id: i32,
    #[validate(length(min = 1, max = 50, message = "Integration type is required"))]
    #[serde(rename = "type")]
    pub kind: String,
    pub config: serde_json::Value,
}

/// POST /api/integrations
pub async fn create_integration(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IntegrationRequest>,
) -> Result<(StatusCode, Json<Integration>), AppError> {
    require_role(&claims, &[Role::Engineer])?;
    req.validate()
        .map_err(|e| crate::error::validation_error(e.to_string()))?;

    state
        .catalog
        .get_service(req.service_id)
        .await?
        .ok_or_else(|| not_found_error("Service not found"))?;

    let integration = state
        .catalog
        .insert_integration(req.service_id, &req.kind, &req.config, &claims.username)
        .await?;

    state
        .audit
        .record("Integration Added", "Integration", integration.id, claims.sub)
        .await?;

    Ok((StatusCode::CREATED, Json(integration)))
}

/// GET /api/integrations
pub async fn list_integrations(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Integration>>, AppError> {
    require_role(&claims, &[Role::Engineer])?;

    let integrations = state.catalog.list_integrations().await?;
    Ok(Json(integrations))
}
