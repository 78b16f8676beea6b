//! Database services
//!
//! Direct PostgreSQL access behind small per-concern services. Each
//! service owns a handle to the shared pool; the catalog service also
//! implements the monitor's `HealthStore` seam.

mod audit;
mod catalog;
mod risk;
mod users;

pub use audit::{AuditEntry, AuditService};
pub use catalog::{BiaWrite, CatalogService};
pub use risk::RiskService;
pub use users::{DbUser, UserService};
