mod snapshot;
mod sync;
mod sync_runs;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimits, RequestId,
};
use crate::runner::SyncContext;

#[derive(Clone)]
pub struct AppState {
    pub ctx: SyncContext,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

/// Every error this API can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.error.code.status(), Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(20).clamp(1, 100)
}

pub(super) fn map_db_error(request_id: String, error: &catsync_db::DbError) -> ApiError {
    if let catsync_db::DbError::NotFound = error {
        return ApiError::new(request_id, ErrorCode::NotFound, "record not found");
    }
    tracing::error!(request_id = %request_id, error = %error, "database query failed");
    ApiError::new(request_id, ErrorCode::InternalError, "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

/// Authenticated routes. Auth runs first so rejected callers spend no budget.
fn protected_router(auth: AuthState, limits: RateLimits) -> Router<AppState> {
    let sync_routes = Router::new()
        .route("/api/v1/sync", post(sync::trigger_sync))
        .route_layer(axum::middleware::from_fn_with_state(
            limits.sync,
            enforce_rate_limit,
        ));
    let read_routes = Router::new()
        .route("/api/v1/sync-runs", get(sync_runs::list_sync_runs))
        .route("/api/v1/snapshot", get(snapshot::get_snapshot_status))
        .route_layer(axum::middleware::from_fn_with_state(
            limits.reads,
            enforce_rate_limit,
        ));

    sync_routes
        .merge(read_routes)
        .route_layer(axum::middleware::from_fn_with_state(auth, require_bearer_auth))
}

pub fn build_app(state: AppState, auth: AuthState, limits: RateLimits) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(protected_router(auth, limits))
        .layer(build_cors())
        .layer(axum::middleware::from_fn(request_id))
        .with_state(state)
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    sync: SyncHealth,
}

/// Harvester state an operator needs when syncs start failing.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct SyncHealth {
    running: bool,
    breaker_open: bool,
    breaker_failures: u32,
    breaker_retry_after_secs: Option<u64>,
}

impl SyncHealth {
    fn capture(ctx: &SyncContext) -> Self {
        let stats = ctx.sync.harvester().breaker().stats();
        Self {
            running: ctx.sync.is_running(),
            breaker_open: stats.open,
            breaker_failures: stats.consecutive_failures,
            breaker_retry_after_secs: stats.retry_after.map(|d| d.as_secs()),
        }
    }
}

/// `GET /api/v1/health`: database reachability plus harvester state.
///
/// An open breaker is reported but does not degrade the status; it recovers
/// on its own.
async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let sync = SyncHealth::capture(&state.ctx);
    let meta = ResponseMeta::new(req_id.0);

    let (status, data) = match catsync_db::health_check(&state.ctx.pool).await {
        Ok(()) => (
            StatusCode::OK,
            HealthData {
                status: "ok",
                database: "ok",
                sync,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthData {
                    status: "degraded",
                    database: "unavailable",
                    sync,
                },
            )
        }
    };

    (status, Json(ApiResponse { data, meta }))
}

#[cfg(test)]
mod tests;
