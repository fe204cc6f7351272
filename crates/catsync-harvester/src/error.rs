use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid search endpoint \"{endpoint}\": {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Failures that end a category's loop outside the normal
/// completed/aborted paths.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("pagination limit reached for category {category}: exceeded {max_pages} pages")]
    PaginationLimit { category: String, max_pages: u32 },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a catalog sync is already running")]
    AlreadyRunning,

    #[error("failed to persist catalog snapshot: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}
