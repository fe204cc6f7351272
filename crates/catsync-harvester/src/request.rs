//! Request body for one window of the remote product search.

use catsync_core::RemoteSettings;
use serde_json::{json, Value};

const OPERATION_NAME: &str = "productSearchV3";
const ORDER_BY: &str = "OrderByScoreDESC";
const FACET_KEY: &str = "c";

/// One pagination window `[from, to)` of a category's result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category: String,
    pub from: u32,
    pub to: u32,
}

impl PageRequest {
    #[must_use]
    pub fn new(category: impl Into<String>, cursor: u32, batch_size: u32) -> Self {
        Self {
            category: category.into(),
            from: cursor,
            to: cursor.saturating_add(batch_size),
        }
    }

    /// Number of records the window asks for.
    #[must_use]
    pub fn window(&self) -> u32 {
        self.to - self.from
    }
}

/// Builds the persisted-query POST body for `request`.
///
/// The query hash, sender and provider are static configuration; the remote
/// resolves the query text from the hash.
#[must_use]
pub fn search_body(remote: &RemoteSettings, request: &PageRequest) -> Value {
    json!({
        "operationName": OPERATION_NAME,
        "variables": {
            "query": request.category,
            "selectedFacets": [
                { "key": FACET_KEY, "value": request.category }
            ],
            "from": request.from,
            "to": request.to,
            "orderBy": ORDER_BY,
            "map": FACET_KEY,
        },
        "extensions": {
            "persistedQuery": {
                "version": 1,
                "sha256Hash": remote.persisted_query_hash,
                "sender": remote.sender,
                "provider": remote.provider,
            }
        }
    })
}
