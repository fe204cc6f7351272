//! One complete catalog sync: harvest every enabled category, then hand the
//! consolidated snapshot to the store as a single replace.
//!
//! Runs never overlap. The breaker and batch state are per-process and a
//! second concurrent run would corrupt them, so [`SyncService::run`] refuses
//! to start while another run holds the lock instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use catsync_core::{CatalogSnapshot, SnapshotStore};

use crate::error::SyncError;
use crate::orchestrator::{AbortCause, CategoryReport, CategoryStatus, EndOfResults, Harvester};
use crate::outcome::OutcomeKind;
use crate::retry::ExhaustionReason;
use crate::transport::PageTransport;

/// Result string reported to whoever triggered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    /// Same string the variant serializes to.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

/// Likely cause shown when a run collected no records at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    NoConnectivity,
    NoMatchingProducts,
    SiteStructureChanged,
    Throttled,
}

impl Advisory {
    /// Same string the variant serializes to.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Advisory::NoConnectivity => "no_connectivity",
            Advisory::NoMatchingProducts => "no_matching_products",
            Advisory::SiteStructureChanged => "site_structure_changed",
            Advisory::Throttled => "throttled",
        }
    }

    /// Higher wins when categories point at different causes.
    fn priority(self) -> u8 {
        match self {
            Advisory::SiteStructureChanged => 3,
            Advisory::Throttled => 2,
            Advisory::NoConnectivity => 1,
            Advisory::NoMatchingProducts => 0,
        }
    }

    /// Picks the most specific advisory implied by a run's category reports.
    #[must_use]
    pub fn from_reports(reports: &[CategoryReport]) -> Self {
        reports
            .iter()
            .map(|r| Self::from_status(&r.status))
            .max_by_key(|a| a.priority())
            .unwrap_or(Advisory::NoMatchingProducts)
    }

    fn from_status(status: &CategoryStatus) -> Self {
        match status {
            CategoryStatus::Completed(EndOfResults::MissingResults) => {
                Advisory::SiteStructureChanged
            }
            CategoryStatus::Completed(EndOfResults::EmptyPage) | CategoryStatus::Failed(_) => {
                Advisory::NoMatchingProducts
            }
            CategoryStatus::Aborted(AbortCause::FailureCeiling { last }) => match last {
                ExhaustionReason::CircuitOpen => Advisory::Throttled,
                ExhaustionReason::NonRetryable(kind) | ExhaustionReason::RetriesExhausted(kind) => {
                    Self::from_kind(*kind)
                }
            },
        }
    }

    fn from_kind(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::ClientError(_) | OutcomeKind::Malformed => Advisory::SiteStructureChanged,
            OutcomeKind::RateLimited | OutcomeKind::ServerError(503 | 504) => Advisory::Throttled,
            OutcomeKind::ServerError(_)
            | OutcomeKind::Timeout
            | OutcomeKind::ConnectionError
            | OutcomeKind::Unexpected => Advisory::NoConnectivity,
            OutcomeKind::Success => Advisory::NoMatchingProducts,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Advisory::NoConnectivity => "the remote catalog could not be reached",
            Advisory::NoMatchingProducts => "no products matched the configured categories",
            Advisory::SiteStructureChanged => {
                "the remote search no longer returns the expected structure"
            }
            Advisory::Throttled => "the remote catalog is throttling requests",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Present only when the run collected zero records.
    pub advisory: Option<Advisory>,
    pub snapshot: CatalogSnapshot,
}

/// Clears the running flag however `run` exits.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncService<T, S> {
    harvester: Harvester<T>,
    store: S,
    run_lock: Mutex<()>,
    running: AtomicBool,
}

impl<T: PageTransport, S: SnapshotStore> SyncService<T, S> {
    #[must_use]
    pub fn new(harvester: Harvester<T>, store: S) -> Self {
        Self {
            harvester,
            store,
            run_lock: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn harvester(&self) -> &Harvester<T> {
        &self.harvester
    }

    /// Read-only view of the run lock; never contends with [`Self::run`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one full sync over `categories`.
    ///
    /// Category-level failures do not fail the call: whatever was gathered is
    /// persisted and the report carries [`SyncStatus::Error`]. A run that
    /// gathered nothing still replaces the snapshot and carries an advisory.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRunning`] if another run holds the lock, or
    /// [`SyncError::Store`] if the snapshot could not be written.
    pub async fn run(&self, categories: &[String]) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("sync requested while another run is in progress");
            return Err(SyncError::AlreadyRunning);
        };
        let _running = RunningFlag::raise(&self.running);

        tracing::info!(categories = categories.len(), "catalog sync started");
        let run = self.harvester.harvest(categories).await;

        let status = if run.reports.iter().any(|r| matches!(r.status, CategoryStatus::Failed(_))) {
            SyncStatus::Error
        } else {
            SyncStatus::Success
        };

        let snapshot = CatalogSnapshot {
            harvested_at: Utc::now(),
            categories: run.completions(),
            products: run.products,
        };

        let advisory = snapshot.products.is_empty().then(|| {
            let advisory = Advisory::from_reports(&run.reports);
            tracing::warn!(
                advisory = ?advisory,
                message = advisory.message(),
                "sync collected zero records"
            );
            advisory
        });

        self.store
            .replace_snapshot(&snapshot)
            .await
            .map_err(|e| SyncError::Store(Box::new(e)))?;

        self.store
            .record_last_sync(snapshot.harvested_at)
            .await
            .map_err(|e| SyncError::Store(Box::new(e)))?;

        tracing::info!(
            records = snapshot.products.len(),
            incomplete = ?snapshot.incomplete_categories(),
            ?status,
            "catalog sync finished"
        );

        Ok(SyncReport {
            status,
            advisory,
            snapshot,
        })
    }
}
