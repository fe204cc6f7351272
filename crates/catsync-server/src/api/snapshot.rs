use axum::{extract::State, Extension, Json};
use catsync_core::{CategoryCompletion, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ErrorCode, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SnapshotStatus {
    last_sync_at: Option<DateTime<Utc>>,
    harvested_at: DateTime<Utc>,
    records: usize,
    complete: bool,
    categories: Vec<CategoryCompletion>,
}

/// `GET /api/v1/snapshot`: summary of the stored catalog without the records.
pub(super) async fn get_snapshot_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SnapshotStatus>>, ApiError> {
    let store = state.ctx.sync.store();

    let snapshot = store
        .load_snapshot()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), ErrorCode::NotFound, "no catalog snapshot yet"))?;
    let last_sync_at = store
        .last_sync()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SnapshotStatus {
            last_sync_at,
            harvested_at: snapshot.harvested_at,
            records: snapshot.products.len(),
            complete: snapshot.is_complete(),
            categories: snapshot.categories,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
