//! Per-category pagination loop and the sequential multi-category run.
//!
//! Each category runs its own [`HarvestSession`]:
//!
//! ```text
//! Running --[empty page / no results field]--> Completed
//! Running --[failure ceiling reached]--------> Aborted   (partial records kept)
//! Running --[page cap reached]---------------> Failed    (partial records kept)
//! ```
//!
//! Categories and pages are processed strictly one after another: each
//! window's offset depends on the batch size chosen after the previous one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use catsync_core::{CategoryCompletion, HarvestSettings, PaginationSettings, ProductRecord};

use crate::batch::{BatchController, BatchSignal};
use crate::breaker::CircuitBreaker;
use crate::error::HarvestError;
use crate::normalize::normalize_product;
use crate::retry::{pause, ExhaustionReason, RetryingExecutor};
use crate::session::HarvestSession;
use crate::transport::PageTransport;

/// How the remote signalled that a category has no more pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfResults {
    EmptyPage,
    /// The payload had no products field at all.
    MissingResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    /// Too many exhausted pages in a row; carries the last exhaustion reason.
    FailureCeiling { last: ExhaustionReason },
}

#[derive(Debug)]
pub enum CategoryStatus {
    Completed(EndOfResults),
    Aborted(AbortCause),
    Failed(HarvestError),
}

impl CategoryStatus {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, CategoryStatus::Completed(_))
    }
}

#[derive(Debug)]
pub struct CategoryReport {
    pub category: String,
    pub status: CategoryStatus,
    pub records: usize,
    pub requests: u32,
}

impl CategoryReport {
    #[must_use]
    pub fn completion(&self) -> CategoryCompletion {
        CategoryCompletion {
            category: self.category.clone(),
            complete: self.status.is_complete(),
            records: self.records,
            requests: self.requests,
        }
    }
}

/// Records and terminal status of one category.
#[derive(Debug)]
pub struct CategoryHarvest {
    pub records: Vec<ProductRecord>,
    pub report: CategoryReport,
}

/// Concatenated records and per-category reports of a full run.
#[derive(Debug, Default)]
pub struct HarvestRun {
    pub products: Vec<ProductRecord>,
    pub reports: Vec<CategoryReport>,
}

impl HarvestRun {
    #[must_use]
    pub fn completions(&self) -> Vec<CategoryCompletion> {
        self.reports.iter().map(CategoryReport::completion).collect()
    }
}

pub struct Harvester<T> {
    executor: RetryingExecutor<T>,
    batch: BatchController,
    pagination: PaginationSettings,
}

impl<T: PageTransport> Harvester<T> {
    #[must_use]
    pub fn new(transport: T, breaker: Arc<CircuitBreaker>, settings: &HarvestSettings) -> Self {
        Self {
            executor: RetryingExecutor::new(transport, breaker, settings.retry.clone()),
            batch: BatchController::new(settings.batch.clone()),
            pagination: settings.pagination.clone(),
        }
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.executor.breaker()
    }

    /// Delay between successful pages, growing with the breaker's global
    /// failure count.
    fn pace(&self) -> Duration {
        let failures = self.breaker().consecutive_failures();
        let p = &self.pagination;
        (p.min_pace + p.pace_per_breaker_failure.saturating_mul(failures)).min(p.max_pace)
    }

    /// Paginates one category until the remote runs out of results, the
    /// failure ceiling is hit, or the page cap is reached. Records gathered
    /// before an abort are returned alongside the status.
    pub async fn harvest_category(&self, category: &str) -> CategoryHarvest {
        let mut session = HarvestSession::new(category, self.batch.initial());
        tracing::info!(category, batch_size = session.batch_size, "harvesting category");

        let status = loop {
            if session.requests >= self.pagination.max_pages {
                let err = HarvestError::PaginationLimit {
                    category: category.to_string(),
                    max_pages: self.pagination.max_pages,
                };
                tracing::error!(category, cursor = session.cursor, error = %err, "category failed");
                break CategoryStatus::Failed(err);
            }

            let request = session.page_request();
            let window = request.window();
            session.requests += 1;

            let started = Instant::now();
            let result = self.executor.fetch_page(&request).await;
            let elapsed = started.elapsed();

            match result {
                Err(exhausted) => {
                    session.consecutive_failures += 1;
                    self.batch.adjust(&mut session, elapsed, BatchSignal::Failure);
                    tracing::warn!(
                        category,
                        from = request.from,
                        to = request.to,
                        consecutive_failures = session.consecutive_failures,
                        error = %exhausted,
                        "page exhausted, skipping window"
                    );

                    if session.consecutive_failures >= self.pagination.failure_ceiling {
                        tracing::error!(
                            category,
                            consecutive_failures = session.consecutive_failures,
                            kept = session.accumulated.len(),
                            "category aborted after repeated failures"
                        );
                        break CategoryStatus::Aborted(AbortCause::FailureCeiling {
                            last: exhausted.reason,
                        });
                    }

                    session.advance(window);
                    pause(self.pagination.failure_pause).await;
                }
                Ok(payload) => {
                    let Some(products) = payload.into_products() else {
                        tracing::info!(category, cursor = session.cursor, "payload carried no results field");
                        break CategoryStatus::Completed(EndOfResults::MissingResults);
                    };
                    if products.is_empty() {
                        break CategoryStatus::Completed(EndOfResults::EmptyPage);
                    }

                    let received = products.len();
                    session
                        .accumulated
                        .extend(products.into_iter().map(normalize_product));
                    session.consecutive_failures = 0;
                    self.batch.adjust(&mut session, elapsed, BatchSignal::Success);
                    session.advance(window);

                    tracing::debug!(
                        category,
                        received,
                        total = session.accumulated.len(),
                        next_cursor = session.cursor,
                        "page harvested"
                    );
                    pause(self.pace()).await;
                }
            }
        };

        let report = CategoryReport {
            category: category.to_string(),
            status,
            records: session.accumulated.len(),
            requests: session.requests,
        };
        tracing::info!(
            category,
            records = report.records,
            requests = report.requests,
            complete = report.status.is_complete(),
            "category finished"
        );

        CategoryHarvest {
            records: session.accumulated,
            report,
        }
    }

    /// Harvests every category in order and concatenates their records.
    pub async fn harvest(&self, categories: &[String]) -> HarvestRun {
        let mut run = HarvestRun::default();
        for category in categories {
            let CategoryHarvest { records, report } = self.harvest_category(category).await;
            run.products.extend(records);
            run.reports.push(report);
        }
        run
    }
}
