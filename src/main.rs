//! RiskWatch API - Service Catalog & Business Impact Analysis Platform
//!
//! Registered services carry BIA metadata (criticality, recovery
//! objectives, dependencies), status and downtime history. From those the
//! platform derives a weighted risk score per service, and a periodic
//! health monitor reclassifies every service from elapsed time since its
//! last status refresh.

mod auth;
mod config;
mod db;
mod error;
mod models;
mod monitor;
mod risk;
mod routes;
mod state;

use crate::config::{DatabaseConfig, Settings};
use crate::db::CatalogService;
use crate::monitor::{HealthMonitor, LogAlerter};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting RiskWatch - Service Catalog & BIA Platform...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if std::env::var("JWT_SECRET").is_err() {
        warn!("⚠️  JWT_SECRET not set, using default (INSECURE - set in production!)");
    }

    // Initialize database pool - REQUIRED (no in-memory fallback)
    let pool = match init_database_pool(&settings.database).await {
        Ok(pool) => {
            info!("✅ Database pool created successfully");
            pool
        }
        Err(e) => {
            error!("❌ FATAL: Failed to initialize database pool: {}", e);
            error!("DATABASE_URL must be set in .env and database must be accessible");
            return Err(e);
        }
    };

    // Create tables if they don't exist
    if let Err(e) = create_database_tables(&pool).await {
        warn!("⚠️  Warning creating tables: {}", e);
    }

    let state = Arc::new(AppState::new(pool.clone()));

    // Shutdown signal fan-out: the HTTP server and the health monitor
    // both observe this channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn the periodic health monitor
    let monitor = HealthMonitor::new(
        CatalogService::new(pool.clone()),
        Arc::new(LogAlerter),
        Duration::from_secs(settings.monitor.interval_minutes * 60),
        shutdown_rx,
    );
    let monitor_handle = tokio::spawn(monitor.run());

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Authentication ───");
    info!("   POST /api/auth/signup          - Register new account");
    info!("   POST /api/auth/login           - Login with username/password");
    info!("   GET  /api/auth/me              - Get current user");
    info!("");
    info!("   ─── Service Catalog ───");
    info!("   GET  /api/services             - List services with BIA and status");
    info!("   POST /api/services             - Create service + BIA");
    info!("   PUT  /api/services/:id         - Update service and BIA");
    info!("   PUT  /api/services/:id/status  - Write service status");
    info!("   PUT  /api/services/:id/bia     - Create/update BIA");
    info!("   POST /api/services/:id/downtime - Record downtime");
    info!("   GET  /api/services/:id/health  - Health view with uptime");
    info!("   GET  /api/services/dependencies - Dependency fan-out");
    info!("");
    info!("   ─── Risk & Audit ───");
    info!("   GET  /api/risk/:id             - Latest risk snapshot");
    info!("   POST /api/risk/:id/save        - Compute & save automated risk");
    info!("   POST /api/risk/:id/manual      - Record manual risk");
    info!("   PUT  /api/risk/:id/manual      - Overwrite latest risk");
    info!("   GET  /api/audit                - Audit trail");
    info!("");
    info!(
        "🩺 Health monitor runs every {} minutes",
        settings.monitor.interval_minutes
    );

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Fan the signal out to the monitor loop
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Let the monitor finish its current sweep
    let _ = monitor_handle.await;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,riskwatch_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Initialize database pool from settings
async fn init_database_pool(db: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod};

    let mut cfg = Config::new();
    cfg.host = Some(db.host.clone());
    cfg.port = Some(db.port);
    cfg.user = Some(db.user.clone());
    cfg.password = Some(db.password.clone());
    cfg.dbname = Some(db.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(db.max_pool_size));

    // Create pool with TLS support if needed
    let pool = if db.ssl {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    // Test the connection
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;

    let _row = client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", db.ssl);
    Ok(pool)
}

/// Create database tables if they don't exist
async fn create_database_tables(pool: &deadpool_postgres::Pool) -> anyhow::Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                username VARCHAR(80) UNIQUE NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(50) NOT NULL DEFAULT 'viewer',
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS services (
                id SERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                description TEXT,
                created_by VARCHAR(100),
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS bia (
                id SERIAL PRIMARY KEY,
                service_id INTEGER UNIQUE NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                criticality VARCHAR(20),
                impact VARCHAR(50),
                rto INTEGER,
                rpo INTEGER,
                signed_off BOOLEAN NOT NULL DEFAULT false
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS bia_dependencies (
                service_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                dependency_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                PRIMARY KEY (service_id, dependency_id)
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS service_status (
                id SERIAL PRIMARY KEY,
                service_id INTEGER UNIQUE NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                status VARCHAR(20) NOT NULL DEFAULT 'Unknown',
                last_updated TIMESTAMPTZ
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS downtime (
                id SERIAL PRIMARY KEY,
                service_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                start_time TIMESTAMPTZ NOT NULL,
                end_time TIMESTAMPTZ,
                reason VARCHAR(255)
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS integrations (
                id SERIAL PRIMARY KEY,
                service_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                kind VARCHAR(50) NOT NULL,
                config JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_by VARCHAR(100),
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS risks (
                id SERIAL PRIMARY KEY,
                service_id INTEGER NOT NULL REFERENCES services(id) ON DELETE CASCADE,
                risk_score INTEGER NOT NULL,
                risk_level VARCHAR(20) NOT NULL,
                reason TEXT,
                source VARCHAR(20) NOT NULL DEFAULT 'automated',
                created_by VARCHAR(100),
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id SERIAL PRIMARY KEY,
                action VARCHAR(100) NOT NULL,
                entity VARCHAR(50) NOT NULL,
                entity_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            &[],
        )
        .await?;

    // Create indexes for performance
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_downtime_service_start
             ON downtime(service_id, start_time DESC)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_risks_service_created
             ON risks(service_id, created_at DESC)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_integrations_service_id
             ON integrations(service_id)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp
             ON audit_log(timestamp DESC)",
            &[],
        )
        .await;

    info!("✅ Database tables initialized");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
