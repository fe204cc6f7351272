//! Process-wide circuit breaker shielding the remote search API.
//!
//! ```text
//! CLOSED --[threshold consecutive failures]--> OPEN --[recovery timeout elapsed]--> CLOSED
//! ```
//!
//! There is no separate half-open state: once the cooldown since the
//! last failure has elapsed the next `allow_request` closes the breaker,
//! resets the counter, and lets that request decide.
//!
//! One instance is built at startup and shared (via `Arc`) by every
//! executor. Only the executor records outcomes.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use catsync_core::BreakerSettings;

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    open: bool,
}

/// Point-in-time view of the breaker for logging and status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerStats {
    pub consecutive_failures: u32,
    pub open: bool,
    /// Time left before an open breaker admits a recovery request.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BreakerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` while the breaker is open and cooling down.
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub(crate) fn allow_request_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if !state.open {
            return true;
        }

        let cooled_down = state
            .last_failure
            .is_none_or(|at| now.saturating_duration_since(at) > self.settings.recovery_timeout);

        if cooled_down {
            state.open = false;
            state.consecutive_failures = 0;
            tracing::info!(
                recovery_secs = self.settings.recovery_timeout.as_secs(),
                "circuit breaker recovered; admitting requests again"
            );
            true
        } else {
            false
        }
    }

    /// Decrements the failure counter by one, floored at zero.
    ///
    /// Does not close an open breaker; only the recovery timeout does.
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_sub(1);
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure = Some(now);

        if !state.open && state.consecutive_failures >= self.settings.failure_threshold {
            state.open = true;
            tracing::error!(
                consecutive_failures = state.consecutive_failures,
                recovery_secs = self.settings.recovery_timeout.as_secs(),
                "circuit breaker opened; short-circuiting requests"
            );
        }
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    #[must_use]
    pub fn stats(&self) -> BreakerStats {
        let state = self.lock();
        let retry_after = if state.open {
            state.last_failure.map(|at| {
                self.settings
                    .recovery_timeout
                    .saturating_sub(at.elapsed())
            })
        } else {
            None
        };
        BreakerStats {
            consecutive_failures: state.consecutive_failures,
            open: state.open,
            retry_after,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
