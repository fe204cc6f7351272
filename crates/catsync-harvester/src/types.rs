//! Response types for the remote `productSearch` persisted query.
//!
//! ## Observed shape
//!
//! ```text
//! { "data": { "productSearch": { "products": [ { "productReference": "...",
//!   "productName": "...", "brand": "...",
//!   "priceRange": { "sellingPrice": { "lowPrice": 1250.0, "highPrice": 1250.0 } } } ] } } }
//! ```
//!
//! When the persisted query no longer matches the storefront schema, the
//! remote answers 200 with `"data": null` (plus an `errors` array) or with
//! `productSearch` missing. Every level is therefore optional, and a missing
//! `products` array is read as end-of-results rather than a parse failure.

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub data: Option<SearchData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchData {
    #[serde(rename = "productSearch", default)]
    pub product_search: Option<ProductSearch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductSearch {
    #[serde(default)]
    pub products: Option<Vec<RawProduct>>,
}

/// A single product as returned by the search API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProduct {
    #[serde(rename = "productReference", default)]
    pub product_reference: Option<String>,

    #[serde(rename = "productName", default)]
    pub product_name: Option<String>,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(rename = "priceRange", default)]
    pub price_range: Option<PriceRange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRange {
    #[serde(rename = "sellingPrice", default)]
    pub selling_price: Option<PriceBounds>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceBounds {
    #[serde(rename = "lowPrice", default)]
    pub low_price: Option<Decimal>,
}

impl SearchPayload {
    /// The page's products, or `None` when the payload carries no results
    /// field at all.
    #[must_use]
    pub fn into_products(self) -> Option<Vec<RawProduct>> {
        self.data?.product_search?.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_page() {
        let body = r#"{"data":{"productSearch":{"products":[
            {"productReference":"7001","productName":"Arroz Agulha 1kg","brand":"Tio Lucas",
             "priceRange":{"sellingPrice":{"lowPrice":1250.5,"highPrice":1300}}}
        ]}}}"#;
        let payload: SearchPayload = serde_json::from_str(body).expect("parse");
        let products = payload.into_products().expect("results field");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_reference.as_deref(), Some("7001"));
        let low = products[0]
            .price_range
            .as_ref()
            .and_then(|r| r.selling_price.as_ref())
            .and_then(|s| s.low_price);
        assert_eq!(low, Some(Decimal::new(12505, 1)));
    }

    #[test]
    fn null_data_has_no_results_field() {
        let payload: SearchPayload =
            serde_json::from_str(r#"{"data":null,"errors":[{"message":"PersistedQueryNotFound"}]}"#)
                .expect("parse");
        assert!(payload.into_products().is_none());
    }

    #[test]
    fn missing_product_search_has_no_results_field() {
        let payload: SearchPayload = serde_json::from_str(r#"{"data":{}}"#).expect("parse");
        assert!(payload.into_products().is_none());
    }

    #[test]
    fn empty_products_array_is_present_but_empty() {
        let payload: SearchPayload =
            serde_json::from_str(r#"{"data":{"productSearch":{"products":[]}}}"#).expect("parse");
        assert_eq!(payload.into_products().map(|p| p.len()), Some(0));
    }

    #[test]
    fn products_of_wrong_type_is_a_parse_error() {
        let result =
            serde_json::from_str::<SearchPayload>(r#"{"data":{"productSearch":{"products":"x"}}}"#);
        assert!(result.is_err());
    }
}
