//! Service catalog route handlers
//!
//! CRUD for services and their BIA metadata, status writes, downtime
//! records, the dependency fan-out view and the per-service health view.

use crate::auth::{require_role, Claims, Role};
use crate::db::BiaWrite;
use crate::error::{not_found_error, validation_error, AppError};
use crate::models::{Bia, Downtime, HealthState, MessageResponse, RiskLevel};
use crate::risk::{assess, uptime_percent, RiskInputs};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

// ============================================
// Request/Response Types
// ============================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 100, message = "Service name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub dependencies: Option<Vec<i32>>,
    pub signed_off: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateServiceRequest {
    #[validate(length(min = 1, max = 100, message = "Service name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub dependencies: Option<Vec<i32>>,
    pub signed_off: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StatusWriteRequest {
    pub status: HealthState,
}

#[derive(Debug, Deserialize)]
pub struct BiaRequest {
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub signed_off: Option<bool>,
    pub dependencies: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct DowntimeRequest {
    pub start_time: String,
    pub end_time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BiaSummary {
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub signed_off: bool,
    pub dependencies: Vec<i32>,
}

impl BiaSummary {
    fn from_bia(bia: Option<&Bia>) -> Self {
        match bia {
            Some(b) => Self {
                criticality: b.criticality.clone(),
                impact: b.impact.clone(),
                rto: b.rto,
                rpo: b.rpo,
                signed_off: b.signed_off,
                dependencies: b.dependencies.clone(),
            },
            None => Self {
                criticality: None,
                impact: None,
                rto: None,
                rpo: None,
                signed_off: false,
                dependencies: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub bia: BiaSummary,
    pub status: HealthState,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ServiceCreatedResponse {
    pub success: bool,
    pub message: String,
    pub service_id: i32,
}

#[derive(Debug, Serialize)]
pub struct DowntimeLoggedResponse {
    pub success: bool,
    pub message: String,
    pub downtime: Downtime,
}

#[derive(Debug, Serialize)]
pub struct DowntimeRow {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub duration_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct DowntimeListResponse {
    pub service_id: i32,
    pub service_name: String,
    pub downtime_count: usize,
    pub downtimes: Vec<DowntimeRow>,
}

#[derive(Debug, Serialize)]
pub struct LatestDowntime {
    pub start_time: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealthResponse {
    pub service_id: i32,
    pub name: String,
    pub status: HealthState,
    pub last_updated: Option<DateTime<Utc>>,
    pub bia: BiaSummary,
    pub downtime: Option<LatestDowntime>,
    pub overall_health: RiskLevel,
    pub reason: String,
    pub uptime_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct DependencyInfo {
    pub service_id: i32,
    pub service_name: String,
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub status: Option<HealthState>,
}

#[derive(Debug, Serialize)]
pub struct ServiceDependencies {
    pub service_id: i32,
    pub service_name: String,
    pub dependencies: Vec<DependencyInfo>,
}

#[derive(Debug, Serialize)]
pub struct DependencyListResponse {
    pub dependencies: Vec<ServiceDependencies>,
}

// ============================================
// Helpers
// ============================================

/// Parse an ISO 8601 / RFC 3339 timestamp. A bare
/// `YYYY-MM-DDTHH:MM:SS` is accepted and treated as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(validation_error(
        "Invalid date format. Use ISO 8601 (YYYY-MM-DDTHH:MM:SS).",
    ))
}

// ============================================
// Route Handlers
// ============================================

/// GET /api/services
///
/// List all services with embedded BIA and current status.
pub async fn list_services(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ServiceSummary>>, AppError> {
    let services = state.catalog.list_services().await?;

    let mut results = Vec::with_capacity(services.len());
    for service in services {
        let bia = state.catalog.get_bia(service.id).await?;
        let status = state.catalog.get_status(service.id).await?;

        results.push(ServiceSummary {
            id: service.id,
            name: service.name,
            description: service.description,
            created_by: service.created_by,
            bia: BiaSummary::from_bia(bia.as_ref()),
            status: status
                .as_ref()
                .map(|s| s.status)
                .unwrap_or(HealthState::Unknown),
            last_updated: status.and_then(|s| s.last_updated),
        });
    }

    Ok(Json(results))
}

/// POST /api/services
///
/// Create a service together with its BIA and dependency links.
pub async fn create_service(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceCreatedResponse>), AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let service = state
        .catalog
        .create_service(&req.name, req.description.as_deref(), &claims.username)
        .await?;

    state
        .catalog
        .upsert_bia(
            service.id,
            BiaWrite {
                criticality: req.criticality,
                impact: req.impact,
                rto: req.rto,
                rpo: req.rpo,
                signed_off: req.signed_off,
                dependencies: req.dependencies,
            },
        )
        .await?;

    state
        .audit
        .record("Service Created", "Service", service.id, claims.sub)
        .await?;

    info!(service_id = service.id, name = %service.name, "service created");

    Ok((
        StatusCode::CREATED,
        Json(ServiceCreatedResponse {
            success: true,
            message: "Service created".to_string(),
            service_id: service.id,
        }),
    ))
}

/// PUT /api/services/{id}
///
/// Partial update of service fields and, when a BIA exists, its fields.
/// Dependencies are only replaced when the request carries them.
pub async fn update_service(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateServiceRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    state
        .catalog
        .update_service(id, req.name.as_deref(), req.description.as_deref())
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    if let Some(existing) = state.catalog.get_bia(id).await? {
        let dependencies = req.dependencies.or(Some(existing.dependencies));
        state
            .catalog
            .upsert_bia(
                id,
                BiaWrite {
                    criticality: req.criticality,
                    impact: req.impact,
                    rto: req.rto,
                    rpo: req.rpo,
                    signed_off: req.signed_off,
                    dependencies,
                },
            )
            .await?;
    }

    state
        .audit
        .record("Service Updated", "Service", id, claims.sub)
        .await?;

    Ok(Json(MessageResponse::new("Service updated successfully")))
}

/// DELETE /api/services/{id}
pub async fn delete_service(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;

    if !state.catalog.delete_service(id).await? {
        return Err(not_found_error(format!("Service {} not found", id)));
    }

    state
        .audit
        .record("Service Deleted", "Service", id, claims.sub)
        .await?;

    Ok(Json(MessageResponse::new("Service deleted successfully")))
}

/// POST|PUT /api/services/{id}/status
///
/// Upsert the status row; `last_updated` is stamped server-side.
pub async fn update_status(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<StatusWriteRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;

    state
        .catalog
        .get_service(id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    state.catalog.upsert_status(id, req.status, Utc::now()).await?;

    state
        .audit
        .record("Status Updated", "Status", id, claims.sub)
        .await?;

    Ok(Json(MessageResponse::new("Status updated successfully")))
}

/// PUT /api/services/{id}/bia
///
/// Create or update the BIA. The dependency link set is always replaced
/// by the request's list (absent list clears it).
pub async fn upsert_bia(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<BiaRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;

    state
        .catalog
        .get_service(id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    state
        .catalog
        .upsert_bia(
            id,
            BiaWrite {
                criticality: req.criticality,
                impact: req.impact,
                rto: req.rto,
                rpo: req.rpo,
                signed_off: req.signed_off,
                dependencies: req.dependencies,
            },
        )
        .await?;

    state
        .audit
        .record("BIA Updated", "BIA", id, claims.sub)
        .await?;

    Ok(Json(MessageResponse::new("BIA updated successfully")))
}

/// DELETE /api/services/{id}/bia
pub async fn delete_bia(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    require_role(&claims, &[Role::BusinessOwner])?;

    if !state.catalog.delete_bia(id).await? {
        return Err(not_found_error("No BIA found for this service"));
    }

    state
        .audit
        .record("BIA Deleted", "BIA", id, claims.sub)
        .await?;

    Ok(Json(MessageResponse::new("BIA deleted successfully")))
}

/// POST /api/services/{id}/downtime
///
/// Record a downtime event. Malformed timestamps are rejected before
/// any write happens.
pub async fn record_downtime(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
    Json(req): Json<DowntimeRequest>,
) -> Result<Json<DowntimeLoggedResponse>, AppError> {
    let service = state
        .catalog
        .get_service(id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    let start_time = parse_timestamp(&req.start_time)?;
    let end_time = req.end_time.as_deref().map(parse_timestamp).transpose()?;

    if let Some(end) = end_time {
        if end < start_time {
            return Err(validation_error("end_time must not be before start_time"));
        }
    }

    let reason = req.reason.as_deref().unwrap_or("Not specified");
    let downtime = state
        .catalog
        .insert_downtime(service.id, start_time, end_time, reason)
        .await?;

    state
        .audit
        .record("Downtime Logged", "Downtime", service.id, claims.sub)
        .await?;

    Ok(Json(DowntimeLoggedResponse {
        success: true,
        message: "Downtime logged".to_string(),
        downtime,
    }))
}

/// GET /api/services/{id}/downtime
pub async fn list_downtime(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> Result<Json<DowntimeListResponse>, AppError> {
    let service = state
        .catalog
        .get_service(id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    let now = Utc::now();
    let downtimes = state.catalog.list_downtime(id).await?;

    let rows: Vec<DowntimeRow> = downtimes
        .into_iter()
        .map(|d| DowntimeRow {
            duration_minutes: (d.end_time.unwrap_or(now) - d.start_time).num_minutes(),
            start_time: d.start_time,
            end_time: d.end_time,
            reason: d.reason,
        })
        .collect();

    Ok(Json(DowntimeListResponse {
        service_id: service.id,
        service_name: service.name,
        downtime_count: rows.len(),
        downtimes: rows,
    }))
}

/// GET /api/services/{id}/health
///
/// Current status, BIA summary, latest downtime, on-the-fly risk
/// assessment and uptime percentage for one service.
pub async fn service_health(
    State(state): State<SharedState>,
    Path(id): Path<i32>,
) -> Result<Json<ServiceHealthResponse>, AppError> {
    let service = state
        .catalog
        .get_service(id)
        .await?
        .ok_or_else(|| not_found_error(format!("Service {} not found", id)))?;

    let now = Utc::now();
    let bia = state.catalog.get_bia(id).await?;
    let status = state.catalog.get_status(id).await?;
    let downtimes = state.catalog.list_downtime(id).await?;
    let integration_count = state.catalog.count_integrations(id).await? as usize;
    let dependencies = match &bia {
        Some(bia) => super::risk::resolve_dependency_health(&state, bia).await?,
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
    let uptime = uptime_percent(status.as_ref(), &downtimes, now);

    // Rows come back newest-first
    let latest_downtime = downtimes.first().map(|d| LatestDowntime {
        start_time: d.start_time,
        reason: d.reason.clone(),
    });

    Ok(Json(ServiceHealthResponse {
        service_id: service.id,
        name: service.name,
        status: status
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(HealthState::Unknown),
        last_updated: status.and_then(|s| s.last_updated),
        bia: BiaSummary::from_bia(bia.as_ref()),
        downtime: latest_downtime,
        overall_health: assessment.level,
        reason: assessment.reason(),
        uptime_percentage: uptime,
    }))
}

/// GET /api/services/dependencies
///
/// Dependency fan-out: every service that declares dependencies, with
/// each dependency's BIA fields and current status.
pub async fn list_dependencies(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DependencyListResponse>, AppError> {
    require_role(&claims, &[Role::Engineer])?;

    let services = state.catalog.list_services().await?;

    let mut result = Vec::new();
    for service in services {
        let Some(bia) = state.catalog.get_bia(service.id).await? else {
            continue;
        };
        if bia.dependencies.is_empty() {
            continue;
        }

        let mut dependencies = Vec::with_capacity(bia.dependencies.len());
        for dep_id in &bia.dependencies {
            let Some(dep) = state.catalog.get_service(*dep_id).await? else {
                continue;
            };
            let dep_bia = state.catalog.get_bia(dep.id).await?;
            let dep_status = state.catalog.get_status(dep.id).await?;

            dependencies.push(DependencyInfo {
                service_id: dep.id,
                service_name: dep.name,
                criticality: dep_bia.as_ref().and_then(|b| b.criticality.clone()),
                impact: dep_bia.as_ref().and_then(|b| b.impact.clone()),
                rto: dep_bia.as_ref().and_then(|b| b.rto),
                rpo: dep_bia.as_ref().and_then(|b| b.rpo),
                status: dep_status.map(|s| s.status),
            });
        }

        result.push(ServiceDependencies {
            service_id: service.id,
            service_name: service.name,
            dependencies,
        });
    }

    Ok(Json(DependencyListResponse {
        dependencies: result,
    }))
}
