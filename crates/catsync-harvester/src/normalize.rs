//! Mapping from raw search results to [`catsync_core::ProductRecord`].

use catsync_core::ProductRecord;

use crate::types::RawProduct;

/// Converts a raw search result into a [`ProductRecord`].
///
/// Missing names and brands become empty strings, blank references become
/// `None`, and the price is the lowest selling price when present.
#[must_use]
pub fn normalize_product(product: RawProduct) -> ProductRecord {
    let price = product
        .price_range
        .and_then(|r| r.selling_price)
        .and_then(|s| s.low_price)
        .map(|p| p.normalize());

    ProductRecord {
        reference: product
            .product_reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        name: product.product_name.unwrap_or_default().trim().to_string(),
        brand: product.brand.unwrap_or_default().trim().to_string(),
        price,
    }
}
