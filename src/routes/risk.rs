//! Risk route handlers
//!
//! Read the current risk snapshot, compute-and-save an automated score,
//! and record or overwrite manual scores.

use crate::auth::{require_role, Claims, Role};
use crate::error::{not_found_error, AppError};
use crate::models::{Bia, Risk, RiskLevel, RiskSource};
use crate::risk::{assess, DependencyHealth, RiskInputs};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct ManualRiskRequest {
    pub risk_score: i32,
    pub risk_level: RiskLevel,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RiskResponse {
    pub service_id: i32,
    pub risk_score: i32,
    pub risk_level: RiskLevel,
    pub reason: Option<String>,
    pub source: RiskSource,
    pub created_by: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Risk> for RiskResponse {
    fn from(risk: Risk) -> Self {
        Self {
            service_id: risk.service_id,
            risk_score: risk.risk_score,
            risk_level: risk.risk_level,
            reason: risk.reason,
            source: risk.source,
            created_by: risk.created_by,
            created_at: risk.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiskSavedResponse {
    pub success: bool,
    pub message: String,
    pub service_id: i32,
    pub risk_score: i32,
    pub risk_level: RiskLevel,
    pub reason: String,
}

// ============================================
// Helpers
// ============================================

/// Resolve each BIA dependency id to its service name and current
/// status. Ids that no longer resolve to a service are skipped.
pub async fn resolve_dependency_health(
    state: &SharedState,
    bia: &Bia,
) -> Result<Vec<DependencyHealth>, AppError> {
    let mut dependencies = Vec::with_capacity(bia.dependencies.len());
    for dep_id in &bia.dependencies {
        let Some(service) = state.catalog.get_service(*dep_id).await? else {
            continue;
        };
        let status = state.catalog.get_status(*dep_id).await?;
        dependencies.push(DependencyHealth {
            name: service.name,
            status: status.map(|s| s.status),
        });
    }
    Ok(dependencies)
}

// ============================================
// Route Handlers
// ============================================

/// GET /api/risk/{service_id}
///
/// Latest persisted risk snapshot (manual or automated).
pub async fn get_risk(
    State(state): State<SharedState>,
    Path(service_id): Path<i32>,
) -> Result<Json<RiskResponse>, AppError> {
    state
        .catalog
        .get_service(service_id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", service_id)))?;

    let risk = state
        .risks
        .latest(service_id)
        .await?
        .ok_or_else(|| not_found_error("No risk score available for this service"))?;

    Ok(Json(RiskResponse::from(risk)))
}

/// POST /api/risk/{service_id}/save
///
/// Compute the risk score from current catalog state and append it as
/// an automated snapshot.
pub async fn save_risk(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(service_id): Path<i32>,
) -> Result<Json<RiskSavedResponse>, AppError> {
    require_role(&claims, &[Role::OpsAnalyst])?;

    let service = state
        .catalog
        .get_service(service_id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", service_id)))?;

    let now = Utc::now();
    let bia = state.catalog.get_bia(service_id).await?;
    let status = state.catalog.get_status(service_id).await?;
    let downtimes = state.catalog.list_downtime(service_id).await?;
    let integration_count = state.catalog.count_integrations(service_id).await? as usize;
    let dependencies = match &bia {
        Some(bia) => resolve_dependency_health(&state, bia).await?,
        None => Vec::new(),
    };

    let assessment = assess(
        &RiskInputs {
            bia: bia.as_ref(),
            status: status.as_ref(),
            downtimes: &downtimes,
            dependencies: &dependencies,
            integration_count,
        },
        now,
    );
    let reason = assessment.reason();

    state
        .risks
        .insert(
            service_id,
            assessment.score,
            assessment.level,
            Some(&reason),
            RiskSource::Automated,
            &claims.username,
        )
        .await?;

    state
        .audit
        .record("Automated Risk Score Saved", "Risk", service_id, claims.sub)
        .await?;

    info!(
        service_id,
        score = assessment.score,
        level = %assessment.level,
        "automated risk score saved for '{}'", service.name
    );

    Ok(Json(RiskSavedResponse {
        success: true,
        message: "Risk score saved".to_string(),
        service_id,
        risk_score: assessment.score,
        risk_level: assessment.level,
        reason,
    }))
}

/// POST /api/risk/{service_id}/manual
///
/// Append an analyst-entered risk snapshot.
pub async fn create_manual_risk(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(service_id): Path<i32>,
    Json(req): Json<ManualRiskRequest>,
) -> Result<Json<RiskResponse>, AppError> {
    require_role(&claims, &[Role::OpsAnalyst])?;

    state
        .catalog
        .get_service(service_id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", service_id)))?;

    let risk = state
        .risks
        .insert(
            service_id,
            req.risk_score.clamp(0, 100),
            req.risk_level,
            req.reason.as_deref(),
            RiskSource::Manual,
            &claims.username,
        )
        .await?;

    state
        .audit
        .record("Manual Risk Score Added", "Risk", service_id, claims.sub)
        .await?;

    Ok(Json(RiskResponse::from(risk)))
}

/// PUT /api/risk/{service_id}/manual
///
/// Overwrite the most recent risk row for the service in place (score,
/// level, reason, actor, timestamp). No row is created when none exists.
pub async fn update_manual_risk(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(service_id): Path<i32>,
    Json(req): Json<ManualRiskRequest>,
) -> Result<Json<RiskResponse>, AppError> {
    require_role(&claims, &[Role::OpsAnalyst])?;

    let risk = state
        .risks
        .update_latest(
            service_id,
            req.risk_score.clamp(0, 100),
            req.risk_level,
            req.reason.as_deref(),
            &claims.username,
            Utc::now(),
        )
        .await?
        .ok_or_else(|| not_found_error("No risk record found to update"))?;

    state
        .audit
        .record("Manual Risk Score Updated", "Risk", service_id, claims.sub)
        .await?;

    Ok(Json(RiskResponse::from(risk)))
}
