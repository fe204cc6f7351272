use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use catsync_core::{HarvestSettings, RemoteSettings};
use catsync_db::PgSnapshotStore;
use catsync_harvester::{CircuitBreaker, Harvester, SearchTransport, SyncService};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::middleware::{AuthState, RateLimitState, RateLimits};
use crate::runner::SyncContext;

// -------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------

fn write_categories(yaml: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("catsync-categories-{}.yaml", uuid::Uuid::new_v4()));
    std::fs::write(&path, yaml).expect("write categories file");
    path
}

fn build_state(pool: sqlx::PgPool, server: &MockServer, categories_path: PathBuf) -> AppState {
    let settings = HarvestSettings::default().without_delays();
    let transport = SearchTransport::new(RemoteSettings {
        endpoint: format!("{}/graphql", server.uri()),
        ..RemoteSettings::default()
    })
    .expect("transport");
    let breaker = Arc::new(CircuitBreaker::new(settings.breaker.clone()));
    let harvester = Harvester::new(transport, breaker, &settings);
    let sync = SyncService::new(harvester, PgSnapshotStore::new(pool.clone()));

    AppState {
        ctx: SyncContext {
            pool,
            sync: Arc::new(sync),
            categories_path: Arc::new(categories_path),
        },
    }
}

fn open_app(state: AppState) -> Router {
    let auth = AuthState::from_keys("", true).expect("auth");
    build_app(state, auth, RateLimits::default())
}

/// One page of `count` products, then empty pages.
async fn mount_single_page(server: &MockServer, count: usize) {
    let products: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "productReference": format!("REF-{i}"),
                "productName": format!("Produto {i}"),
                "brand": "Marca",
                "priceRange": { "sellingPrice": { "lowPrice": 99.5 } }
            })
        })
        .collect();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "productSearch": { "products": products } } })),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "productSearch": { "products": [] } } })),
        )
        .mount(server)
        .await;
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

// -------------------------------------------------------------------------
// Unit tests (no DB)
// -------------------------------------------------------------------------

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None), 20);
    assert_eq!(normalize_limit(Some(0)), 1);
    assert_eq!(normalize_limit(Some(1_000)), 100);
    assert_eq!(normalize_limit(Some(25)), 25);
}

#[test]
fn api_error_codes_map_to_statuses() {
    let status = |code| ApiError::new("req-1", code, "x").into_response().status();
    assert_eq!(status(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status(ErrorCode::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(status(ErrorCode::RateLimited), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(status(ErrorCode::InternalError), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn error_codes_serialize_snake_case() {
    let body = serde_json::to_value(ApiError::new("req-1", ErrorCode::RateLimited, "slow down"))
        .expect("serialize error");
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(body["meta"]["request_id"], "req-1");
}

#[test]
fn missing_row_maps_to_not_found() {
    let err = map_db_error("req-1".to_string(), &catsync_db::DbError::NotFound);
    assert_eq!(err.error.code, ErrorCode::NotFound);
}

// -------------------------------------------------------------------------
// Route integration tests (with DB)
// -------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_database_ok(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let app = open_app(build_state(pool, &server, write_categories("categories: []")));

    let (status, json) = send(&app, "GET", "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["sync"]["running"], false);
    assert_eq!(json["data"]["sync"]["breaker_open"], false);
    assert_eq!(json["data"]["sync"]["breaker_failures"], 0);
    assert!(json["meta"]["request_id"].is_string());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_requires_bearer_token_when_keys_configured(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let state = build_state(pool, &server, write_categories("categories: []"));
    let auth = AuthState::from_keys("secret-token", false).expect("auth");
    let app = build_app(state, auth, RateLimits::default());

    let (status, json) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/sync")
                .header("authorization", "Bearer secret-token")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_persists_snapshot_and_records_run(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    mount_single_page(&server, 4).await;
    let categories = write_categories("categories:\n  - name: bebidas\n  - name: limpeza\n    include: false\n");
    let app = open_app(build_state(pool, &server, categories));

    let (status, json) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "success");
    assert_eq!(json["data"]["records"], 4);
    assert!(json["data"]["advisory"].is_null());

    let (status, json) = send(&app, "GET", "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["records"], 4);
    assert_eq!(json["data"]["complete"], true);
    assert!(json["data"]["last_sync_at"].is_string());
    let categories = json["data"]["categories"].as_array().expect("categories");
    assert_eq!(categories.len(), 1, "excluded category is not harvested");
    assert_eq!(categories[0]["category"], "bebidas");

    let (status, json) = send(&app, "GET", "/api/v1/sync-runs").await;
    assert_eq!(status, StatusCode::OK);
    let runs = json["data"].as_array().expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["trigger_source"], "api");
    assert_eq!(runs[0]["status"], "succeeded");
    assert_eq!(runs[0]["outcome"], "success");
    assert_eq!(runs[0]["records_processed"], 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn snapshot_is_not_found_before_first_sync(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let app = open_app(build_state(pool, &server, write_categories("categories: []")));

    let (status, json) = send(&app, "GET", "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn zero_record_sync_reports_advisory(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .mount(&server)
        .await;
    let app = open_app(build_state(
        pool,
        &server,
        write_categories("categories:\n  - name: bebidas\n"),
    ));

    let (_, json) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(json["data"]["outcome"], "success");
    assert_eq!(json["data"]["advisory"], "site_structure_changed");
    assert_eq!(json["data"]["records"], 0);

    let (status, json) = send(&app, "GET", "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK, "empty runs still replace the snapshot");
    assert_eq!(json["data"]["records"], 0);
    assert_eq!(json["data"]["categories"][0]["category"], "bebidas");
}

#[sqlx::test(migrations = "../../migrations")]
async fn unreadable_categories_file_reports_error(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let missing = std::env::temp_dir().join("catsync-does-not-exist.yaml");
    let app = open_app(build_state(pool, &server, missing));

    let (status, json) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["outcome"], "error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn overlapping_sync_is_rejected(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "productSearch": { "products": [] } } }))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;
    let app = open_app(build_state(
        pool,
        &server,
        write_categories("categories:\n  - name: bebidas\n"),
    ));

    let first = tokio::spawn({
        let app = app.clone();
        async move { send(&app, "POST", "/api/v1/sync").await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (_, second) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(second["data"]["outcome"], "error");

    let (_, first) = first.await.expect("first sync task");
    assert_eq!(first["data"]["outcome"], "success");
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limit_rejects_excess_requests(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let state = build_state(pool, &server, write_categories("categories: []"));
    let auth = AuthState::from_keys("", true).expect("auth");
    let limits = RateLimits {
        reads: RateLimitState::new(1, Duration::from_secs(60)),
        ..RateLimits::default()
    };
    let app = build_app(state, auth, limits);

    let (status, _) = send(&app, "GET", "/api/v1/sync-runs").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "POST", "/api/v1/sync").await;
    assert_eq!(status, StatusCode::OK, "sync budget is separate from reads");
    assert_eq!(json["data"]["outcome"], "success");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/sync-runs")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn rejected_tokens_do_not_spend_rate_budget(pool: sqlx::PgPool) {
    let server = MockServer::start().await;
    let state = build_state(pool, &server, write_categories("categories: []"));
    let auth = AuthState::from_keys("secret-token", false).expect("auth");
    let limits = RateLimits {
        reads: RateLimitState::new(1, Duration::from_secs(60)),
        ..RateLimits::default()
    };
    let app = build_app(state, auth, limits);

    for _ in 0..3 {
        let (status, _) = send(&app, "GET", "/api/v1/sync-runs").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/sync-runs")
                .header("authorization", "Bearer secret-token")
                .header("x-request-id", "caller-id-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "caller-id-1");
}
