use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, RETRY_AFTER},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::api::{ApiError, ErrorCode};

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 64;

/// Request ID stored as a request extension and echoed on the response.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// Bearer tokens allowed to trigger syncs and read catalog state.
#[derive(Clone)]
pub struct AuthState {
    api_keys: Arc<Vec<String>>,
    pub enabled: bool,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("api_keys", &self.api_keys.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl AuthState {
    /// Reads `CATSYNC_API_KEYS` (comma-separated bearer tokens).
    ///
    /// # Errors
    ///
    /// Fails outside development when no key is configured.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("CATSYNC_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Same as [`Self::from_env`] with the raw key list supplied directly.
    ///
    /// # Errors
    ///
    /// Fails outside development when `raw` holds no key.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        keys.sort_unstable();
        keys.dedup();

        if keys.is_empty() && !is_development {
            anyhow::bail!("CATSYNC_API_KEYS must list at least one bearer token outside development");
        }
        if keys.is_empty() {
            tracing::warn!("CATSYNC_API_KEYS empty; sync endpoints are unauthenticated");
        }

        Ok(Self {
            enabled: !keys.is_empty(),
            api_keys: Arc::new(keys),
        })
    }

    /// Compares against every key so timing does not reveal which one matched.
    fn allows(&self, token: &str) -> bool {
        let matched = self
            .api_keys
            .iter()
            .fold(subtle::Choice::from(0), |acc, key| {
                acc | key.as_bytes().ct_eq(token.as_bytes())
            });
        matched.into()
    }
}

/// Counter for one fixed window.
#[derive(Debug)]
struct FixedWindow {
    started_at: Instant,
    count: usize,
}

impl FixedWindow {
    /// Counts one request at `now`, or returns how long until the window resets.
    fn admit(&mut self, now: Instant, max_requests: usize, window: Duration) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= window {
            self.started_at = now;
            self.count = 0;
        }

        if self.count >= max_requests {
            let elapsed = now.saturating_duration_since(self.started_at);
            return Err(window.saturating_sub(elapsed));
        }

        self.count += 1;
        Ok(())
    }
}

/// Fixed-window limiter; clones share one counter.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<FixedWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(FixedWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    fn admit(&self) -> Result<(), Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(Instant::now(), self.max_requests, self.window)
    }
}

/// Separate budgets: a sync trigger harvests the whole catalog, reads are cheap.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub sync: RateLimitState,
    pub reads: RateLimitState,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            sync: RateLimitState::new(6, Duration::from_secs(60)),
            reads: RateLimitState::new(60, Duration::from_secs(60)),
        }
    }
}

/// Accepts a caller-supplied ID only if it is short and header-safe.
fn sanitize_request_id(value: Option<&HeaderValue>) -> Option<String> {
    let raw = value?.to_str().ok()?.trim();
    let valid = !raw.is_empty()
        && raw.len() <= MAX_REQUEST_ID_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    valid.then(|| raw.to_string())
}

/// Tags every request with an ID, reusing a well-formed `x-request-id`.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = sanitize_request_id(req.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => {
            let req_id = request_id_of(&req);
            tracing::warn!(request_id = %req_id, path = %req.uri().path(), "rejected bearer token");
            ApiError::new(req_id, ErrorCode::Unauthorized, "missing or invalid bearer token")
                .into_response()
        }
    }
}

pub async fn enforce_rate_limit(
    State(limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    match limit.admit() {
        Ok(()) => next.run(req).await,
        Err(reset_in) => {
            let retry_after = reset_in.as_secs().max(1);
            let req_id = request_id_of(&req);
            tracing::warn!(request_id = %req_id, path = %req.uri().path(), retry_after, "rate limit exceeded");
            let mut res = ApiError::new(req_id, ErrorCode::RateLimited, "rate limit exceeded")
                .into_response();
            res.headers_mut().insert(RETRY_AFTER, HeaderValue::from(retry_after));
            res
        }
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        let header = HeaderValue::from_static("Bearer  sync-token ");
        assert_eq!(extract_bearer_token(Some(&header)), Some("sync-token"));
        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&basic)), None);
        let blank = HeaderValue::from_static("Bearer   ");
        assert_eq!(extract_bearer_token(Some(&blank)), None);
    }

    #[test]
    fn missing_keys_disable_auth_only_in_development() {
        let state = AuthState::from_keys("", true).expect("dev allows missing keys");
        assert!(!state.enabled);
        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn keys_are_trimmed_and_matched_exactly() {
        let state = AuthState::from_keys(" alpha ,beta,,alpha ", false).expect("keys");
        assert!(state.enabled);
        assert!(state.allows("alpha"));
        assert!(state.allows("beta"));
        assert!(!state.allows("alph"));
        assert!(!state.allows("alphabet"));
        assert!(!state.allows(""));
    }

    #[test]
    fn debug_output_hides_keys() {
        let state = AuthState::from_keys("super-secret", false).expect("keys");
        assert!(!format!("{state:?}").contains("super-secret"));
    }

    #[test]
    fn fixed_window_admits_up_to_budget_then_resets() {
        let start = Instant::now();
        let window = Duration::from_secs(60);
        let mut counter = FixedWindow {
            started_at: start,
            count: 0,
        };

        assert!(counter.admit(start, 2, window).is_ok());
        assert!(counter.admit(start + Duration::from_secs(1), 2, window).is_ok());
        let wait = counter
            .admit(start + Duration::from_secs(15), 2, window)
            .expect_err("third request is over budget");
        assert_eq!(wait, Duration::from_secs(45));

        assert!(counter.admit(start + window, 2, window).is_ok());
        assert_eq!(counter.count, 1);
    }

    #[test]
    fn request_id_accepts_only_header_safe_values() {
        let ok = HeaderValue::from_static("sync-2026.10_abc");
        assert_eq!(sanitize_request_id(Some(&ok)).as_deref(), Some("sync-2026.10_abc"));

        let spaced = HeaderValue::from_static("has space");
        assert_eq!(sanitize_request_id(Some(&spaced)), None);

        let long = HeaderValue::from_str(&"x".repeat(MAX_REQUEST_ID_LEN + 1)).unwrap();
        assert_eq!(sanitize_request_id(Some(&long)), None);
        assert_eq!(sanitize_request_id(None), None);
    }
}
