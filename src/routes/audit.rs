//! Audit trail route handlers

use crate::db::AuditEntry;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{extract::State, Json};

/// GET /api/audit
///
/// Full audit trail, newest first.
pub async fn list_audit(
    State(state): State<SharedState>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    let entries = state.audit.list().await?;
    Ok(Json(entries))
}
