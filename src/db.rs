//! Order store connection handling.
//!
//! Production runs on PostgreSQL; tests and single-node deployments use a
//! SQLite file. Both go through the same sea-orm pool.

pub mod retry;

use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts, taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl From<&AppConfig> for PoolSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            // a minimum above the maximum makes the pool refuse to start
            min_connections: cfg.db_min_connections.min(cfg.db_max_connections),
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// The backend a connection URL points at. Only SQLite and PostgreSQL are
/// supported.
pub fn backend_for(url: &str) -> Result<DatabaseBackend, ServiceError> {
    let scheme = url.split_once(':').map(|(scheme, _)| scheme).unwrap_or("");
    match scheme {
        "sqlite" => Ok(DatabaseBackend::Sqlite),
        "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
        other => Err(ServiceError::ValidationError(format!(
            "unsupported database scheme '{}'; use sqlite:// or postgres://",
            other
        ))),
    }
}

pub async fn establish_connection_with_settings(
    settings: &PoolSettings,
) -> Result<DbPool, ServiceError> {
    let backend = backend_for(&settings.url)?;
    debug!(?backend, max_connections = settings.max_connections, "configuring order store pool");

    let mut opt = ConnectOptions::new(settings.url.clone());
    opt.max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .connect_timeout(settings.connect_timeout)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .sqlx_logging(false);

    gauge!("replenishment_db.max_connections", settings.max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "order store connection failed");
        ServiceError::DatabaseError(e)
    })?;

    if backend == DatabaseBackend::Sqlite {
        // Readers keep going while one writer holds the lock; competing
        // writers wait and surface as contention.
        pool.execute_unprepared("PRAGMA journal_mode=WAL").await?;
    }

    info!(?backend, "order store pool established");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DbPool, ServiceError> {
    establish_connection_with_settings(&PoolSettings::from(cfg)).await
}

/// Brings the schema up to date with the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => info!(elapsed_ms, "migrations applied"),
        Err(e) => error!(elapsed_ms, error = %e, "migrations failed"),
    }
    result
}

/// Pings the store; used by the readiness probe.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let start = Instant::now();
    let result = pool.ping().await.map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(()) => {
            gauge!("replenishment_db.ping_ms", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!(error = %e, "order store ping failed");
            counter!("replenishment_db.ping_failures", 1);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn backend_follows_the_url_scheme() {
        assert_eq!(
            backend_for("sqlite://replenishment.db?mode=rwc").unwrap(),
            DatabaseBackend::Sqlite
        );
        assert_eq!(
            backend_for("postgres://ro:ro@localhost/replenishment").unwrap(),
            DatabaseBackend::Postgres
        );
        assert_matches!(
            backend_for("mysql://localhost/replenishment"),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(backend_for("sqlite::memory:").unwrap(), DatabaseBackend::Sqlite);
        assert_matches!(backend_for("replenishment.db"), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn pool_minimum_never_exceeds_maximum() {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        cfg.db_max_connections = 2;
        cfg.db_min_connections = 5;
        let settings = PoolSettings::from(&cfg);
        assert_eq!(settings.min_connections, 2);
    }
}
