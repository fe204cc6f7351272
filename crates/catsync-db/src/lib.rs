//! Postgres persistence for catsync: the current catalog document, the
//! last-sync marker and the sync run history.

use std::collections::HashSet;
use std::time::Duration;

use catsync_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

// Path relative to crates/catsync-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Tables the sync cannot run without.
const REQUIRED_TABLES: [&str; 3] = ["catalog_documents", "sync_state", "sync_runs"];

/// Pool sizing taken from [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("sync run {id} cannot transition: expected status '{expected_status}'")]
    InvalidSyncRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("database schema incomplete, missing tables: {}; run `catsync db migrate`", missing.join(", "))]
    SchemaMissing { missing: Vec<&'static str> },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connects the pool described by `config`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    let sizing = PoolConfig::from_app_config(config);
    let pool = PgPoolOptions::new()
        .max_connections(sizing.max_connections)
        .min_connections(sizing.min_connections)
        .acquire_timeout(Duration::from_secs(sizing.acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;
    tracing::debug!(
        max_connections = sizing.max_connections,
        min_connections = sizing.min_connections,
        "database pool connected"
    );
    Ok(pool)
}

/// Applies pending migrations and returns how many were new.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    // Absent on a fresh database; nothing applied yet.
    let before: HashSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success = true")
            .fetch_all(pool)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

    MIGRATOR.run(pool).await?;

    let mut applied = 0;
    for migration in MIGRATOR.iter() {
        if migration.migration_type.is_down_migration() || before.contains(&migration.version) {
            continue;
        }
        tracing::info!(
            version = migration.version,
            description = %migration.description,
            "migration applied"
        );
        applied += 1;
    }
    Ok(applied)
}

/// Checks the pool answers and the catsync tables exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the database is unreachable, or
/// [`DbError::SchemaMissing`] if migrations have not been run.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        let present: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(pool)
            .await?;
        if !present {
            missing.push(table);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DbError::SchemaMissing { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_missing_tables() {
        let err = DbError::SchemaMissing {
            missing: vec!["sync_state", "sync_runs"],
        };
        let message = err.to_string();
        assert!(message.contains("sync_state, sync_runs"));
        assert!(message.contains("catsync db migrate"));
    }

    #[test]
    fn migrations_cover_required_tables() {
        let sql: String = MIGRATOR.iter().map(|m| m.sql.to_string()).collect();
        for table in REQUIRED_TABLES {
            assert!(
                sql.contains(&format!("CREATE TABLE {table}"))
                    || sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "no migration creates {table}"
            );
        }
    }
}

pub mod snapshots;
pub mod sync_runs;

pub use snapshots::{PgSnapshotStore, CATALOG_SNAPSHOT_KEY, LAST_SYNC_KEY};
pub use sync_runs::{
    complete_sync_run, create_sync_run, fail_sync_run, get_sync_run, list_sync_runs,
    SyncRunRow, TriggerSource,
};
