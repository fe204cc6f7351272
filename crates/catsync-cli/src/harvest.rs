use std::sync::Arc;

use anyhow::Context;
use catsync_core::{AppConfig, CategoriesFile, MemorySnapshotStore, SnapshotStore};
use catsync_db::{PgSnapshotStore, TriggerSource};
use catsync_harvester::{
    Advisory, CircuitBreaker, Harvester, SearchTransport, SyncReport, SyncService,
};
use sqlx::PgPool;

/// Picks the categories to harvest.
///
/// With no explicit names, every category marked `include` is used. Named
/// categories must exist in the file but are harvested even when excluded
/// there.
pub(crate) fn resolve_categories(
    file: &CategoriesFile,
    requested: &[String],
) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(file.enabled());
    }

    requested
        .iter()
        .map(|name| {
            file.categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .map(|c| c.name.clone())
                .ok_or_else(|| anyhow::anyhow!("unknown category '{name}'"))
        })
        .collect()
}

fn build_sync<S: SnapshotStore>(
    config: &AppConfig,
    store: S,
) -> anyhow::Result<SyncService<SearchTransport, S>> {
    let transport = SearchTransport::new(config.harvest.remote.clone())
        .context("failed to build search transport")?;
    let breaker = Arc::new(CircuitBreaker::new(config.harvest.breaker.clone()));
    let harvester = Harvester::new(transport, breaker, &config.harvest);
    Ok(SyncService::new(harvester, store))
}

/// Entry point for `catsync harvest`.
pub(crate) async fn run_harvest(
    config: &AppConfig,
    requested: &[String],
    dry_run: bool,
) -> anyhow::Result<()> {
    let file = catsync_core::load_categories(&config.categories_path)?;
    let categories = resolve_categories(&file, requested)?;
    if categories.is_empty() {
        println!("no categories selected; nothing to harvest");
        return Ok(());
    }

    if dry_run {
        tracing::info!(categories = categories.len(), "dry run: snapshot will not be persisted");
        let sync = build_sync(config, MemorySnapshotStore::new())?;
        let report = sync.run(&categories).await?;
        print_report(&report, true);
        return Ok(());
    }

    let pool = catsync_db::connect_pool_from_config(config).await?;
    let sync = build_sync(config, PgSnapshotStore::new(pool.clone()))?;
    let run = catsync_db::create_sync_run(&pool, TriggerSource::Cli).await?;

    let report = match sync.run(&categories).await {
        Ok(report) => report,
        Err(e) => {
            fail_run_best_effort(&pool, run.id, "harvest", &e.to_string()).await;
            return Err(e.into());
        }
    };

    let incomplete: Vec<String> = report
        .snapshot
        .incomplete_categories()
        .into_iter()
        .map(str::to_string)
        .collect();
    let records = i32::try_from(report.snapshot.products.len()).unwrap_or(i32::MAX);
    catsync_db::complete_sync_run(
        &pool,
        run.id,
        report.status.as_str(),
        report.advisory.map(Advisory::as_str),
        records,
        &incomplete,
    )
    .await?;

    print_report(&report, false);
    Ok(())
}

/// Marks a sync run as failed, logging if the update itself fails.
async fn fail_run_best_effort(pool: &PgPool, run_id: i64, context: &str, message: &str) {
    if let Err(e) = catsync_db::fail_sync_run(pool, run_id, message).await {
        tracing::error!(
            run_id,
            context,
            error = %e,
            "failed to mark sync run as failed"
        );
    }
}

fn print_report(report: &SyncReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}outcome: {}  records: {}",
        report.status.as_str(),
        report.snapshot.products.len(),
    );
    for category in &report.snapshot.categories {
        let mark = if category.complete { "complete" } else { "INCOMPLETE" };
        println!(
            "  {:<24} {:>6} records  {:>4} requests  {mark}",
            category.category, category.records, category.requests
        );
    }
    if let Some(advisory) = report.advisory {
        println!("{prefix}advisory: {} ({})", advisory.as_str(), advisory.message());
    }
}
