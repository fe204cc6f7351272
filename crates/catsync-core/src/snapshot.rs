//! Persistence seam for the consolidated catalog.
//!
//! The harvester only ever replaces the whole snapshot and stamps a
//! last-sync marker; any key-value document store can back it.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::products::CatalogSnapshot;

pub trait SnapshotStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stores `snapshot` as the single current catalog, creating it if absent
    /// and overwriting it otherwise.
    fn replace_snapshot(
        &self,
        snapshot: &CatalogSnapshot,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn load_snapshot(
        &self,
    ) -> impl Future<Output = Result<Option<CatalogSnapshot>, Self::Error>> + Send;

    fn record_last_sync(
        &self,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn last_sync(&self) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send;
}

/// Process-local store used by dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<CatalogSnapshot>>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    writes: Mutex<u32>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times [`SnapshotStore::replace_snapshot`] has been called.
    #[must_use]
    pub fn write_count(&self) -> u32 {
        *lock(&self.writes)
    }
}

// A poisoned lock only means another thread panicked mid-write of a plain
// value; the data is still usable.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SnapshotStore for MemorySnapshotStore {
    type Error = Infallible;

    async fn replace_snapshot(&self, snapshot: &CatalogSnapshot) -> Result<(), Infallible> {
        *lock(&self.snapshot) = Some(snapshot.clone());
        *lock(&self.writes) += 1;
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<CatalogSnapshot>, Infallible> {
        Ok(lock(&self.snapshot).clone())
    }

    async fn record_last_sync(&self, at: DateTime<Utc>) -> Result<(), Infallible> {
        *lock(&self.last_sync) = Some(at);
        Ok(())
    }

    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>, Infallible> {
        Ok(*lock(&self.last_sync))
    }
}
