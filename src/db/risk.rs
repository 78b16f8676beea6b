// Risk snapshot storage
//
// Append-only rows ordered by created_at; the newest row is the
// service's current risk. The explicit overwrite operation rewrites the
// latest row in place instead of appending.

use crate::error::AppError;
use crate::models::{Risk, RiskLevel, RiskSource};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

fn risk_from_row(row: &Row) -> Risk {
    let level: String = row.get(3);
    let source: String = row.get(5);
    Risk {
        id: row.get(0),
        service_id: row.get(1),
        risk_score: row.get(2),
        risk_level: RiskLevel::from_db(&level),
        reason: row.get(4),
        source: RiskSource::from_db(&source),
        created_by: row.get(6),
        created_at: row.get(7),
    }
}

/// Risk service for database operations
pub struct RiskService {
    pool: Pool,
}

impl RiskService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Append a new risk snapshot
    pub async fn insert(
        &self,
        service_id: i32,
        risk_score: i32,
        risk_level: RiskLevel,
        reason: Option<&str>,
        source: RiskSource,
        created_by: &str,
    ) -> Result<Risk, AppError> {
        let client = self.pool.get().await?;

        let now = Utc::now();
        let row = client
            .query_one(
                "INSERT INTO risks
                     (service_id, risk_score, risk_level, reason, source, created_by, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id, service_id, risk_score, risk_level, reason, source,
                           created_by, created_at",
                &[
                    &service_id,
                    &risk_score,
                    &risk_level.as_str(),
                    &reason,
                    &source.as_str(),
                    &created_by,
                    &now,
                ],
            )
            .await?;

        Ok(risk_from_row(&row))
    }

    /// The newest risk row for a service, if any
    pub async fn latest(&self, service_id: i32) -> Result<Option<Risk>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, service_id, risk_score, risk_level, reason, source,
                        created_by, created_at
                 FROM risks WHERE service_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                &[&service_id],
            )
            .await?;

        Ok(row.as_ref().map(risk_from_row))
    }

    /// Rewrite the newest risk row in place: score, level, reason (when
    /// given), actor and timestamp. The row's source is left untouched.
    /// Returns `None` when the service has no risk rows.
    pub async fn update_latest(
        &self,
        service_id: i32,
        risk_score: i32,
        risk_level: RiskLevel,
        reason: Option<&str>,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Risk>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "UPDATE risks SET
                     risk_score = $2,
                     risk_level = $3,
                     reason = COALESCE($4, reason),
                     created_by = $5,
                     created_at = $6
                 WHERE id = (
                     SELECT id FROM risks WHERE service_id = $1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )
                 RETURNING id, service_id, risk_score, risk_level, reason, source,
                           created_by, created_at",
                &[
                    &service_id,
                    &risk_score,
                    &risk_level.as_str(),
                    &reason,
                    &created_by,
                    &now,
                ],
            )
            .await?;

        Ok(row.as_ref().map(risk_from_row))
    }
}
