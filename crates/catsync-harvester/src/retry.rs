//! Retrying page executor with an escalating timeout ladder.
//!
//! [`RetryingExecutor::fetch_page`] turns one logical page fetch into up to
//! `max_retries` ladder attempts plus a single short fallback attempt. The
//! backoff between attempts depends on how the previous attempt failed:
//!
//! | Failure class                 | Sleep before next attempt                    |
//! |-------------------------------|----------------------------------------------|
//! | 429 / 503 / 504               | `base × 2^attempt + U(0, rate_limit_jitter)` |
//! | timeout                       | `base × 1.2^attempt + U(0, timeout_jitter)`  |
//! | connection refused / reset    | `base + U(0, connection_jitter)`             |
//! | unexpected                    | `base × 2^attempt`                           |
//!
//! Any other non-2xx status and malformed payloads abandon the page at once.

use std::sync::Arc;
use std::time::Duration;

use catsync_core::RetrySettings;

use crate::breaker::CircuitBreaker;
use crate::outcome::{AttemptTimeouts, OutcomeKind, RequestOutcome};
use crate::request::PageRequest;
use crate::transport::PageTransport;
use crate::types::SearchPayload;

/// Longest single backoff sleep, whatever the attempt number.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why a page was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    /// The breaker was open; no request was sent.
    CircuitOpen,
    /// A status or payload that retrying cannot fix.
    NonRetryable(OutcomeKind),
    /// Every ladder attempt and the fallback failed; carries the last outcome.
    RetriesExhausted(OutcomeKind),
}

/// A page fetch that produced no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageExhausted {
    pub reason: ExhaustionReason,
    /// Requests actually sent, including the fallback.
    pub attempts: u32,
}

impl std::fmt::Display for PageExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            ExhaustionReason::CircuitOpen => write!(f, "circuit breaker open"),
            ExhaustionReason::NonRetryable(kind) => {
                write!(f, "non-retryable outcome {kind} after {} attempt(s)", self.attempts)
            }
            ExhaustionReason::RetriesExhausted(kind) => {
                write!(f, "retries exhausted after {} attempt(s), last {kind}", self.attempts)
            }
        }
    }
}

impl std::error::Error for PageExhausted {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryClass {
    Backpressure,
    Timeout,
    Connection,
    Unexpected,
    NonRetryable,
}

fn retry_class(kind: OutcomeKind) -> RetryClass {
    match kind {
        OutcomeKind::RateLimited | OutcomeKind::ServerError(503 | 504) => RetryClass::Backpressure,
        OutcomeKind::Timeout => RetryClass::Timeout,
        OutcomeKind::ConnectionError => RetryClass::Connection,
        OutcomeKind::Unexpected => RetryClass::Unexpected,
        OutcomeKind::ServerError(_)
        | OutcomeKind::ClientError(_)
        | OutcomeKind::Malformed
        | OutcomeKind::Success => RetryClass::NonRetryable,
    }
}

/// Sleep before the attempt following `attempt` (zero-based).
///
/// `jitter_unit` is a sample from `[0, 1)` scaled onto the class's jitter
/// range; passing it in keeps the schedule deterministic under test.
fn backoff_delay(
    settings: &RetrySettings,
    class: RetryClass,
    attempt: u32,
    jitter_unit: f64,
) -> Duration {
    let base = settings.base_delay;
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay = match class {
        RetryClass::Backpressure => {
            scaled(base, 2f64.powi(exponent)) + settings.rate_limit_jitter.mul_f64(jitter_unit)
        }
        RetryClass::Timeout => {
            scaled(base, 1.2f64.powi(exponent)) + settings.timeout_jitter.mul_f64(jitter_unit)
        }
        RetryClass::Connection => base + settings.connection_jitter.mul_f64(jitter_unit),
        RetryClass::Unexpected => scaled(base, 2f64.powi(exponent)),
        RetryClass::NonRetryable => Duration::ZERO,
    };
    delay.min(MAX_BACKOFF)
}

fn scaled(base: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(MAX_BACKOFF)
}

/// Sleeps for `delay`, skipping the timer entirely when it is zero.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Executes page requests through a [`PageTransport`], consulting and
/// updating the shared [`CircuitBreaker`].
pub struct RetryingExecutor<T> {
    transport: T,
    breaker: Arc<CircuitBreaker>,
    settings: RetrySettings,
}

impl<T: PageTransport> RetryingExecutor<T> {
    #[must_use]
    pub fn new(transport: T, breaker: Arc<CircuitBreaker>, settings: RetrySettings) -> Self {
        Self {
            transport,
            breaker,
            settings,
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn ladder_timeouts(&self, attempt: u32) -> AttemptTimeouts {
        let ladder = &self.settings.timeout_ladder;
        let index = usize::try_from(attempt)
            .unwrap_or(usize::MAX)
            .min(ladder.len().saturating_sub(1));
        let rung = ladder
            .get(index)
            .copied()
            .unwrap_or(self.settings.fallback_read_timeout);
        AttemptTimeouts::from_rung(rung, self.settings.max_connect_timeout)
    }

    /// Fetches one page.
    ///
    /// # Errors
    ///
    /// Returns [`PageExhausted`] when the breaker is open, when the remote
    /// answers with a non-retryable outcome, or when every ladder attempt and
    /// the fallback attempt failed.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<SearchPayload, PageExhausted> {
        if !self.breaker.allow_request() {
            tracing::warn!(
                category = %request.category,
                from = request.from,
                to = request.to,
                "circuit breaker open, skipping page"
            );
            return Err(PageExhausted {
                reason: ExhaustionReason::CircuitOpen,
                attempts: 0,
            });
        }

        let max_retries = self.settings.max_retries;
        let mut last = OutcomeKind::Unexpected;

        for attempt in 0..max_retries {
            let timeouts = self.ladder_timeouts(attempt);
            let outcome = self.transport.send(request, timeouts).await;
            let kind = outcome.kind();

            let payload = match outcome {
                RequestOutcome::Success(payload) => payload,
                failed => {
                    last = kind;
                    let class = retry_class(kind);

                    if class == RetryClass::NonRetryable {
                        tracing::error!(
                            category = %request.category,
                            attempt = attempt + 1,
                            outcome = %kind,
                            detail = failed.detail().unwrap_or_default(),
                            "non-retryable response, abandoning page"
                        );
                        return Err(PageExhausted {
                            reason: ExhaustionReason::NonRetryable(kind),
                            attempts: attempt + 1,
                        });
                    }

                    if class == RetryClass::Unexpected {
                        self.breaker.record_failure();
                    }

                    if attempt + 1 >= max_retries {
                        tracing::warn!(
                            category = %request.category,
                            attempt = attempt + 1,
                            timeout_secs = timeouts.read.as_secs_f64(),
                            outcome = %kind,
                            "retry ladder exhausted"
                        );
                        break;
                    }

                    let delay = backoff_delay(&self.settings, class, attempt, rand::random::<f64>());
                    tracing::warn!(
                        category = %request.category,
                        attempt = attempt + 1,
                        max_retries,
                        timeout_secs = timeouts.read.as_secs_f64(),
                        outcome = %kind,
                        detail = failed.detail().unwrap_or_default(),
                        delay_ms = millis(delay),
                        "page attempt failed, retrying after back-off"
                    );
                    pause(delay).await;
                    continue;
                }
            };

            self.breaker.record_success();
            return Ok(payload);
        }

        self.fallback(request, last).await
    }

    async fn fallback(
        &self,
        request: &PageRequest,
        last: OutcomeKind,
    ) -> Result<SearchPayload, PageExhausted> {
        let timeouts = AttemptTimeouts {
            connect: self.settings.fallback_connect_timeout,
            read: self.settings.fallback_read_timeout,
        };
        let attempts = self.settings.max_retries + 1;

        match self.transport.send(request, timeouts).await {
            RequestOutcome::Success(payload) => {
                tracing::info!(
                    category = %request.category,
                    from = request.from,
                    "fallback attempt succeeded"
                );
                self.breaker.record_success();
                Ok(payload)
            }
            failed => {
                let kind = failed.kind();
                self.breaker.record_failure();
                tracing::error!(
                    category = %request.category,
                    from = request.from,
                    to = request.to,
                    attempts,
                    timeout_secs = timeouts.read.as_secs_f64(),
                    connect_timeout_secs = timeouts.connect.as_secs_f64(),
                    last_ladder_outcome = %last,
                    fallback_outcome = %kind,
                    breaker_failures = self.breaker.consecutive_failures(),
                    "page exhausted after fallback attempt"
                );
                Err(PageExhausted {
                    reason: ExhaustionReason::RetriesExhausted(kind),
                    attempts,
                })
            }
        }
    }
}
