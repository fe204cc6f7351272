use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single catalog entry harvested from the remote product search.
///
/// Serialized with the remote field names (`productReference`, `productName`)
/// because downstream price-comparison reports read the snapshot document
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Remote SKU / reference code. Some listings omit it.
    #[serde(rename = "productReference")]
    pub reference: Option<String>,
    #[serde(rename = "productName")]
    pub name: String,
    pub brand: String,
    /// Lowest selling price across the product's offers.
    pub price: Option<Decimal>,
}

/// Completion flag for one category of a harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCompletion {
    pub category: String,
    /// `false` when the category's pagination loop was aborted before the
    /// remote reported end-of-results.
    pub complete: bool,
    /// Records contributed to the snapshot, including partial pages.
    pub records: usize,
    pub requests: u32,
}

/// The consolidated catalog produced by one harvest run.
///
/// Stored as a single document that replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub harvested_at: DateTime<Utc>,
    pub products: Vec<ProductRecord>,
    pub categories: Vec<CategoryCompletion>,
}

impl CatalogSnapshot {
    /// Returns `true` if every harvested category reached end-of-results.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.categories.iter().all(|c| c.complete)
    }

    /// Names of categories whose loop was aborted.
    #[must_use]
    pub fn incomplete_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|c| !c.complete)
            .map(|c| c.category.as_str())
            .collect()
    }
}
