use axum::{extract::State, Extension, Json};

use crate::middleware::RequestId;
use crate::runner::{run_catalog_sync, SyncSummary};

use super::{ApiResponse, AppState, ResponseMeta};

/// `POST /api/v1/sync`: runs one catalog sync to completion.
///
/// Always answers 200; the outcome string is the result. A call made while
/// another run holds the lock returns `"error"` at once instead of queueing.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SyncSummary>> {
    tracing::info!(request_id = %req_id.0, "api: on-demand sync requested");
    let summary = run_catalog_sync(&state.ctx, catsync_db::TriggerSource::Api).await;

    Json(ApiResponse {
        data: summary,
        meta: ResponseMeta::new(req_id.0),
    })
}
