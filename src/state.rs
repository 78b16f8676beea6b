//! Application state management
//!
//! Contains shared state accessible across all handlers.
//! All storage is backed by PostgreSQL.

use crate::db::{AuditService, CatalogService, RiskService, UserService};
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Database connection pool (required)
    pub db_pool: Pool,

    /// User accounts
    pub users: UserService,

    /// Services, BIA, status, downtime and integrations
    pub catalog: CatalogService,

    /// Risk snapshots
    pub risks: RiskService,

    /// Audit trail
    pub audit: AuditService,
}

impl AppState {
    /// Create new application state from a database pool
    pub fn new(pool: Pool) -> Self {
        Self {
            users: UserService::new(pool.clone()),
            catalog: CatalogService::new(pool.clone()),
            risks: RiskService::new(pool.clone()),
            audit: AuditService::new(pool.clone()),
            db_pool: pool,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
