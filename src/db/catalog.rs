// Catalog storage
//
// Services, BIA metadata (with the self-referential dependency links),
// status rows, downtime events and integrations.

use crate::error::AppError;
use crate::models::{Bia, Downtime, HealthState, Integration, Service, ServiceStatus};
use crate::monitor::{HealthStore, StatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

fn service_from_row(row: &Row) -> Service {
    Service {
        id: row.get(0),
        name: row.get(1),
        description: row.get(2),
        created_by: row.get(3),
        created_at: row.get(4),
    }
}

fn status_from_row(row: &Row) -> ServiceStatus {
    let status: String = row.get(2);
    ServiceStatus {
        id: row.get(0),
        service_id: row.get(1),
        status: HealthState::from_db(&status),
        last_updated: row.get(3),
    }
}

fn downtime_from_row(row: &Row) -> Downtime {
    Downtime {
        id: row.get(0),
        service_id: row.get(1),
        start_time: row.get(2),
        end_time: row.get(3),
        reason: row.get(4),
    }
}

fn integration_from_row(row: &Row) -> Integration {
    Integration {
        id: row.get(0),
        service_id: row.get(1),
        kind: row.get(2),
        config: row.get(3),
        created_by: row.get(4),
        created_at: row.get(5),
    }
}

/// Fields accepted by the BIA create-or-update operation. `None` keeps
/// the stored value; `dependencies` of `None` clears the links (the
/// write always replaces the full link set).
#[derive(Debug, Default)]
pub struct BiaWrite {
    pub criticality: Option<String>,
    pub impact: Option<String>,
    pub rto: Option<i32>,
    pub rpo: Option<i32>,
    pub signed_off: Option<bool>,
    pub dependencies: Option<Vec<i32>>,
}

/// Catalog service for database operations
pub struct CatalogService {
    pool: Pool,
}

impl CatalogService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    // ============================================
    // Services
    // ============================================

    pub async fn create_service(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: &str,
    ) -> Result<Service, AppError> {
        let client = self.pool.get().await?;

        let now = Utc::now();
        let row = client
            .query_one(
                "INSERT INTO services (name, description, created_by, created_at)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, name, description, created_by, created_at",
                &[&name, &description, &created_by, &now],
            )
            .await?;

        Ok(service_from_row(&row))
    }

    pub async fn get_service(&self, id: i32) -> Result<Option<Service>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, name, description, created_by, created_at
                 FROM services WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.as_ref().map(service_from_row))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, AppError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT id, name, description, created_by, created_at
                 FROM services ORDER BY id",
                &[],
            )
            .await?;

        Ok(rows.iter().map(service_from_row).collect())
    }

    /// Partial update; `None` keeps the stored value.
    pub async fn update_service(
        &self,
        id: i32,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Service>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "UPDATE services
                 SET name = COALESCE($2, name), description = COALESCE($3, description)
                 WHERE id = $1
                 RETURNING id, name, description, created_by, created_at",
                &[&id, &name, &description],
            )
            .await?;

        Ok(row.as_ref().map(service_from_row))
    }

    /// Delete a service; dependent rows cascade.
    pub async fn delete_service(&self, id: i32) -> Result<bool, AppError> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute("DELETE FROM services WHERE id = $1", &[&id])
            .await?;

        Ok(deleted > 0)
    }

    // ============================================
    // BIA
    // ============================================

    pub async fn get_bia(&self, service_id: i32) -> Result<Option<Bia>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, service_id, criticality, impact, rto, rpo, signed_off
                 FROM bia WHERE service_id = $1",
                &[&service_id],
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let deps = client
            .query(
                "SELECT dependency_id FROM bia_dependencies
                 WHERE service_id = $1 ORDER BY dependency_id",
                &[&service_id],
            )
            .await?;

        Ok(Some(Bia {
            id: row.get(0),
            service_id: row.get(1),
            criticality: row.get(2),
            impact: row.get(3),
            rto: row.get(4),
            rpo: row.get(5),
            signed_off: row.get(6),
            dependencies: deps.iter().map(|r| r.get(0)).collect(),
        }))
    }

    /// Create or update the BIA row and replace its dependency links.
    ///
    /// Dependency ids that don't resolve to an existing service are
    /// silently dropped. Runs in one transaction.
    pub async fn upsert_bia(&self, service_id: i32, write: BiaWrite) -> Result<Bia, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO bia (service_id, criticality, impact, rto, rpo, signed_off)
                 VALUES ($1, $2, $3, $4, $5, COALESCE($6, false))
                 ON CONFLICT (service_id) DO UPDATE SET
                     criticality = COALESCE($2, bia.criticality),
                     impact = COALESCE($3, bia.impact),
                     rto = COALESCE($4, bia.rto),
                     rpo = COALESCE($5, bia.rpo),
                     signed_off = COALESCE($6, bia.signed_off)
                 RETURNING id, service_id, criticality, impact, rto, rpo, signed_off",
                &[
                    &service_id,
                    &write.criticality,
                    &write.impact,
                    &write.rto,
                    &write.rpo,
                    &write.signed_off,
                ],
            )
            .await?;

        let requested = write.dependencies.unwrap_or_default();
        tx.execute(
            "DELETE FROM bia_dependencies WHERE service_id = $1",
            &[&service_id],
        )
        .await?;
        tx.execute(
            "INSERT INTO bia_dependencies (service_id, dependency_id)
             SELECT $1, id FROM services WHERE id = ANY($2)
             ON CONFLICT DO NOTHING",
            &[&service_id, &requested],
        )
        .await?;

        let deps = tx
            .query(
                "SELECT dependency_id FROM bia_dependencies
                 WHERE service_id = $1 ORDER BY dependency_id",
                &[&service_id],
            )
            .await?;

        tx.commit().await?;

        Ok(Bia {
            id: row.get(0),
            service_id: row.get(1),
            criticality: row.get(2),
            impact: row.get(3),
            rto: row.get(4),
            rpo: row.get(5),
            signed_off: row.get(6),
            dependencies: deps.iter().map(|r| r.get(0)).collect(),
        })
    }

    pub async fn delete_bia(&self, service_id: i32) -> Result<bool, AppError> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute("DELETE FROM bia WHERE service_id = $1", &[&service_id])
            .await?;

        Ok(deleted > 0)
    }

    // ============================================
    // Status
    // ============================================

    pub async fn get_status(&self, service_id: i32) -> Result<Option<ServiceStatus>, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, service_id, status, last_updated
                 FROM service_status WHERE service_id = $1",
                &[&service_id],
            )
            .await?;

        Ok(row.as_ref().map(status_from_row))
    }

    pub async fn upsert_status(
        &self,
        service_id: i32,
        status: HealthState,
        last_updated: DateTime<Utc>,
    ) -> Result<ServiceStatus, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                "INSERT INTO service_status (service_id, status, last_updated)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (service_id) DO UPDATE SET status = $2, last_updated = $3
                 RETURNING id, service_id, status, last_updated",
                &[&service_id, &status.as_str(), &last_updated],
            )
            .await?;

        Ok(status_from_row(&row))
    }

    /// Persist a batch of refreshed status rows atomically.
    pub async fn save_status_batch(&self, updates: &[StatusUpdate]) -> Result<(), AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        for update in updates {
            tx.execute(
                "INSERT INTO service_status (service_id, status, last_updated)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (service_id) DO UPDATE SET status = $2, last_updated = $3",
                &[
                    &update.service_id,
                    &update.status.as_str(),
                    &update.last_updated,
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ============================================
    // Downtime
    // ============================================

    pub async fn insert_downtime(
        &self,
        service_id: i32,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<Downtime, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                "INSERT INTO downtime (service_id, start_time, end_time, reason)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, service_id, start_time, end_time, reason",
                &[&service_id, &start_time, &end_time, &reason],
            )
            .await?;

        Ok(downtime_from_row(&row))
    }

    pub async fn list_downtime(&self, service_id: i32) -> Result<Vec<Downtime>, AppError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT id, service_id, start_time, end_time, reason
                 FROM downtime WHERE service_id = $1 ORDER BY start_time DESC",
                &[&service_id],
            )
            .await?;

        Ok(rows.iter().map(downtime_from_row).collect())
    }

    // ============================================
    // Integrations
    // ============================================

    pub async fn insert_integration(
        &self,
        service_id: i32,
        kind: &str,
        config: &serde_json::Value,
        created_by: &str,
    ) -> Result<Integration, AppError> {
        let client = self.pool.get().await?;

        let now = Utc::now();
        let row = client
            .query_one(
                "INSERT INTO integrations (service_id, kind, config, created_by, created_at)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id, service_id, kind, config, created_by, created_at",
                &[&service_id, &kind, &config, &created_by, &now],
            )
            .await?;

        Ok(integration_from_row(&row))
    }

    pub async fn list_integrations(&self) -> Result<Vec<Integration>, AppError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                "SELECT id, service_id, kind, config, created_by, created_at
                 FROM integrations ORDER BY id",
                &[],
            )
            .await?;

        Ok(rows.iter().map(integration_from_row).collect())
    }

    pub async fn count_integrations(&self, service_id: i32) -> Result<i64, AppError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM integrations WHERE service_id = $1",
                &[&service_id],
            )
            .await?;

        Ok(row.get(0))
    }
}

#[async_trait]
impl HealthStore for CatalogService {
    async fn list_services(&self) -> Result<Vec<Service>, AppError> {
        CatalogService::list_services(self).await
    }

    async fn load_status(&self, service_id: i32) -> Result<Option<ServiceStatus>, AppError> {
        self.get_status(service_id).await
    }

    async fn save_statuses(&self, updates: &[StatusUpdate]) -> Result<(), AppError> {
        self.save_status_batch(updates).await
    }
}
