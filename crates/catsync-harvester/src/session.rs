use catsync_core::ProductRecord;

use crate::request::PageRequest;

/// Per-category loop state, owned by a single orchestrator invocation.
#[derive(Debug, Clone)]
pub struct HarvestSession {
    pub category: String,
    /// Offset of the next window into the remote result set.
    pub cursor: u32,
    pub batch_size: u32,
    /// Exhausted pages in a row for this category. Distinct from the
    /// breaker's process-wide counter.
    pub consecutive_failures: u32,
    pub accumulated: Vec<ProductRecord>,
    pub requests: u32,
}

impl HarvestSession {
    #[must_use]
    pub fn new(category: impl Into<String>, batch_size: u32) -> Self {
        Self {
            category: category.into(),
            cursor: 0,
            batch_size,
            consecutive_failures: 0,
            accumulated: Vec::new(),
            requests: 0,
        }
    }

    /// The window starting at the cursor with the current batch size.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.category.clone(), self.cursor, self.batch_size)
    }

    /// Moves the cursor past a window that has been fetched or given up on.
    pub fn advance(&mut self, window: u32) {
        self.cursor = self.cursor.saturating_add(window);
    }
}
