use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SyncRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    sync_run_id: Uuid,
    trigger_source: String,
    status: String,
    outcome: Option<String>,
    advisory: Option<String>,
    records_processed: i32,
    incomplete_categories: Vec<String>,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<catsync_db::SyncRunRow> for SyncRunItem {
    fn from(row: catsync_db::SyncRunRow) -> Self {
        Self {
            sync_run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            outcome: row.outcome,
            advisory: row.advisory,
            records_processed: row.records_processed,
            incomplete_categories: row.incomplete_categories,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

pub(super) async fn list_sync_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SyncRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let rows = catsync_db::list_sync_runs(&state.ctx.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(SyncRunItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
