// Audit trail storage
//
// Append-only log of mutating actions, written by every handler that
// changes the catalog.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde::Serialize;
use tokio_postgres::Row;

/// One audit record
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub id: i32,
    pub action: String,
    pub entity: String,
    pub entity_id: i32,
    pub user_id: i32,
    pub timestamp: DateTime<Utc>,
}

fn entry_from_row(row: &Row) -> AuditEntry {
    AuditEntry {
        id: row.get(0),
        action: row.get(1),
        entity: row.get(2),
        entity_id: row.get(3),
        user_id: row.get(4),
        timestamp: row.get(5),
    }
}

/// Audit service for database operations
pub struct AuditService {
    pool: Pool,
}

impl AuditService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record one action
    pub async fn record(
        &self,
        action: &str,
        entity: &str,
        entity_id: i32,
        user_id: i32,
    ) -> Result<(), AppError> {
        let client = self.pool.get().await?;

        let now = Utc::now();
        client
            .execute(
                "INSERT INTO audit_log (action, entity, entity_id, user_id, timestamp)
                 VALUES ($1, $2, $3, $4, $5)",
                &[&action, &entity, &entity_id, &user_id, &now],
            )
            .await?;

        Ok(())
    }

    /// Full trail, newest first
    pub async fn list(&self) -> Result<Vec<AuditEntry>, AppError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT id, action, entity, entity_id, user_id, timestamp
                 FROM audit_log ORDER BY timestamp DESC, id DESC",
                &[],
            )
            .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }
}
