//! Shared entry point for scheduled and on-demand catalog syncs.
//!
//! Both triggers go through [`run_catalog_sync`], which reloads the category
//! list, records the run in `sync_runs` and reduces the result to the
//! two-valued outcome callers see.

use std::path::PathBuf;
use std::sync::Arc;

use catsync_db::{PgSnapshotStore, TriggerSource};
use catsync_harvester::{Advisory, SearchTransport, SyncError, SyncService, SyncStatus};
use serde::Serialize;
use sqlx::PgPool;

pub type CatalogSync = SyncService<SearchTransport, PgSnapshotStore>;

/// Everything a sync trigger needs; cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub pool: PgPool,
    pub sync: Arc<CatalogSync>,
    pub categories_path: Arc<PathBuf>,
}

/// Result reported back to the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub outcome: SyncStatus,
    pub advisory: Option<Advisory>,
    pub records: usize,
    pub incomplete_categories: Vec<String>,
}

impl SyncSummary {
    fn error() -> Self {
        Self {
            outcome: SyncStatus::Error,
            advisory: None,
            records: 0,
            incomplete_categories: Vec::new(),
        }
    }
}

/// Runs one sync and never fails: every error is logged, recorded on the run
/// row where possible, and reported as [`SyncStatus::Error`].
pub async fn run_catalog_sync(ctx: &SyncContext, trigger: TriggerSource) -> SyncSummary {
    let categories = match catsync_core::load_categories(&ctx.categories_path) {
        Ok(file) => file.enabled(),
        Err(e) => {
            tracing::error!(
                trigger = trigger.as_str(),
                path = %ctx.categories_path.display(),
                error = %e,
                "sync: failed to load categories"
            );
            return SyncSummary::error();
        }
    };

    if ctx.sync.is_running() {
        tracing::warn!(trigger = trigger.as_str(), "sync: another run is in progress");
        return SyncSummary::error();
    }

    let run = match catsync_db::create_sync_run(&ctx.pool, trigger).await {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(error = %e, "sync: failed to create sync run record");
            return SyncSummary::error();
        }
    };

    match ctx.sync.run(&categories).await {
        Ok(report) => {
            let summary = SyncSummary {
                outcome: report.status,
                advisory: report.advisory,
                records: report.snapshot.products.len(),
                incomplete_categories: report
                    .snapshot
                    .incomplete_categories()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            let records = i32::try_from(summary.records).unwrap_or(i32::MAX);
            if let Err(e) = catsync_db::complete_sync_run(
                &ctx.pool,
                run.id,
                summary.outcome.as_str(),
                summary.advisory.map(Advisory::as_str),
                records,
                &summary.incomplete_categories,
            )
            .await
            {
                tracing::error!(run_id = run.id, error = %e, "sync: failed to complete sync run record");
            }
            summary
        }
        Err(err) => {
            match &err {
                SyncError::AlreadyRunning => {
                    tracing::warn!(run_id = run.id, "sync: lost the race for the run lock");
                }
                SyncError::Store(source) => {
                    tracing::error!(run_id = run.id, error = %source, "sync: snapshot write failed");
                }
            }
            if let Err(e) = catsync_db::fail_sync_run(&ctx.pool, run.id, &err.to_string()).await {
                tracing::error!(run_id = run.id, error = %e, "sync: failed to mark sync run failed");
            }
            SyncSummary::error()
        }
    }
}
