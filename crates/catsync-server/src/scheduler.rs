//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring catalog sync.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runner::{run_catalog_sync, SyncContext};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    ctx: SyncContext,
    sync_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_sync_job(&scheduler, ctx, sync_cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the catalog sync on `sync_cron` (hourly by default).
///
/// A tick that fires while the previous run is still going reports an error
/// outcome and returns immediately; runs never overlap.
async fn register_sync_job(
    scheduler: &JobScheduler,
    ctx: SyncContext,
    sync_cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(sync_cron, move |_uuid, _lock| {
        let ctx = ctx.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting catalog sync");
            let summary = run_catalog_sync(&ctx, catsync_db::TriggerSource::Scheduler).await;
            tracing::info!(
                outcome = ?summary.outcome,
                records = summary.records,
                advisory = ?summary.advisory,
                "scheduler: catalog sync complete"
            );
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = sync_cron, "scheduler: catalog sync registered");
    Ok(())
}
