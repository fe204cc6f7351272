//! Additive-increase / additive-decrease page-size controller.
//!
//! The remote never announces its capacity, so the batch ramps one record at
//! a time while pages come back fast and backs off one record when they come
//! back slow. A page that could not be fetched at all shrinks the batch by a
//! larger step.

use std::time::Duration;

use catsync_core::BatchSettings;

use crate::session::HarvestSession;

/// How the page that just finished ended, as far as sizing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSignal {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct BatchController {
    settings: BatchSettings,
}

impl BatchController {
    #[must_use]
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn initial(&self) -> u32 {
        self.clamp(self.settings.initial)
    }

    /// Computes the batch size to use after a page that took `elapsed` and
    /// ended with `signal`. The result is always within `[min, max]`.
    #[must_use]
    pub fn next_batch_size(&self, current: u32, elapsed: Duration, signal: BatchSignal) -> u32 {
        let s = &self.settings;
        let next = match signal {
            BatchSignal::Failure => current.saturating_sub(s.failure_step),
            BatchSignal::Success if elapsed < s.fast_below && current < s.max => current + 1,
            BatchSignal::Success if elapsed > s.slow_above && current > s.min => current - 1,
            BatchSignal::Success => current,
        };
        self.clamp(next)
    }

    /// Applies [`Self::next_batch_size`] to the session in place.
    pub fn adjust(&self, session: &mut HarvestSession, elapsed: Duration, signal: BatchSignal) {
        let next = self.next_batch_size(session.batch_size, elapsed, signal);
        if next != session.batch_size {
            tracing::debug!(
                category = %session.category,
                from = session.batch_size,
                to = next,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                ?signal,
                "batch size adjusted"
            );
        }
        session.batch_size = next;
    }

    fn clamp(&self, size: u32) -> u32 {
        size.clamp(self.settings.min, self.settings.max)
    }
}

impl Default for BatchController {
    fn default() -> Self {
        Self::new(BatchSettings::default())
    }
}
