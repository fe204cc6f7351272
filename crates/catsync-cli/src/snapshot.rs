use catsync_core::SnapshotStore;
use catsync_db::PgSnapshotStore;
use sqlx::PgPool;

/// Entry point for `catsync snapshot show`.
pub(crate) async fn show_snapshot(pool: &PgPool, json: bool) -> anyhow::Result<()> {
    let store = PgSnapshotStore::new(pool.clone());
    let Some(snapshot) = store.load_snapshot().await? else {
        println!("no catalog snapshot stored yet");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let last_sync = store
        .last_sync()
        .await?
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    println!("harvested at: {}", snapshot.harvested_at.to_rfc3339());
    println!("last sync:    {last_sync}");
    println!(
        "records:      {}{}",
        snapshot.products.len(),
        if snapshot.is_complete() { "" } else { " (incomplete)" }
    );
    for category in &snapshot.categories {
        let mark = if category.complete { "complete" } else { "INCOMPLETE" };
        println!("  {:<24} {:>6} records  {mark}", category.category, category.records);
    }
    Ok(())
}

/// Entry point for `catsync runs list`.
pub(crate) async fn list_runs(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = catsync_db::list_sync_runs(pool, limit.clamp(1, 100)).await?;
    if runs.is_empty() {
        println!("no sync runs recorded");
        return Ok(());
    }

    for run in runs {
        println!(
            "{}  {:<9} {:<9} {:<7} {:>6} records  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.trigger_source,
            run.status,
            run.outcome.as_deref().unwrap_or("-"),
            run.records_processed,
            run.advisory
                .as_deref()
                .or(run.error_message.as_deref())
                .unwrap_or(""),
        );
    }
    Ok(())
}
