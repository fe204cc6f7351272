//! Postgres-backed [`SnapshotStore`]: one JSONB document per key in
//! `catalog_documents`, plus named timestamps in `sync_state`.

use catsync_core::{CatalogSnapshot, SnapshotStore};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// Key under which the current consolidated catalog is stored.
pub const CATALOG_SNAPSHOT_KEY: &str = "catalog";
/// `sync_state` key for the wall-clock time of the last finished run.
pub const LAST_SYNC_KEY: &str = "last_sync_at";

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SnapshotStore for PgSnapshotStore {
    type Error = DbError;

    async fn replace_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO catalog_documents (key, document, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE \
             SET document = EXCLUDED.document, updated_at = NOW()",
        )
        .bind(CATALOG_SNAPSHOT_KEY)
        .bind(Json(snapshot))
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            records = snapshot.products.len(),
            key = CATALOG_SNAPSHOT_KEY,
            "catalog snapshot replaced"
        );
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<CatalogSnapshot>, DbError> {
        let row = sqlx::query_scalar::<_, Json<CatalogSnapshot>>(
            "SELECT document FROM catalog_documents WHERE key = $1",
        )
        .bind(CATALOG_SNAPSHOT_KEY)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(snapshot)| snapshot))
    }

    async fn record_last_sync(&self, at: DateTime<Utc>) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO sync_state (key, value, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(LAST_SYNC_KEY)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let value = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT value FROM sync_state WHERE key = $1",
        )
        .bind(LAST_SYNC_KEY)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }
}
