//! Product detail state parser
//!
//! Product pages embed their full state as a JSON object assigned to a
//! window variable. This module finds that object in raw markup and maps the
//! parts the tracker needs (competitor offers, own price, name).

#![allow(clippy::uninlined_format_args)]

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{ParsingError, ParsingResult};
use crate::domain::price::RawPrice;
use crate::domain::product::{CompetitorEntry, UNKNOWN_SELLER, sort_competitors};
use crate::infrastructure::config::MarketplaceConfig;

pub struct ProductDetailParser {
    state_variable: String,
    state_assignment: Regex,
}

impl ProductDetailParser {
    pub fn new(marketplace: &MarketplaceConfig) -> ParsingResult<Self> {
        let pattern = format!(
            r"(?s)window\.{}\s*=\s*(\{{.*?\}});",
            regex::escape(&marketplace.state_variable)
        );
        let state_assignment = Regex::new(&pattern).map_err(|e| ParsingError::InvalidPattern {
            name: "state_assignment".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            state_variable: marketplace.state_variable.clone(),
            state_assignment,
        })
    }

    /// Script expression that yields the state object in a live page
    pub fn state_expression(&self) -> String {
        format!("window.{}", self.state_variable)
    }

    /// Locate and decode the state object in raw page markup.
    ///
    /// The lazy capture ends at the first `};`, which can sit inside the
    /// object. When the capture does not parse on its own, the object is
    /// re-read as a single JSON value starting at the capture.
    pub fn state_from_markup(&self, markup: &str) -> ParsingResult<Value> {
        let capture = self
            .state_assignment
            .captures(markup)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ParsingError::StateBlobMissing {
                variable: self.state_variable.clone(),
            })?;

        let first_error = match serde_json::from_str::<Value>(capture.as_str()) {
            Ok(state) => return Ok(state),
            Err(e) => e,
        };

        let mut stream =
            serde_json::Deserializer::from_str(&markup[capture.start()..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(state)) if state.is_object() => {
                debug!("State object recovered past the first terminator");
                Ok(state)
            }
            _ => Err(ParsingError::state_blob_malformed(
                first_error,
                capture.as_str(),
            )),
        }
    }
}

fn non_empty_array(value: Option<&Value>) -> Option<&Vec<Value>> {
    value
        .and_then(Value::as_array)
        .filter(|entries| !entries.is_empty())
}

/// Raw offers, nested under `product` first, then at the top level.
fn merchant_offers(state: &Value) -> &[Value] {
    non_empty_array(state.pointer("/product/otherMerchants"))
        .or_else(|| non_empty_array(state.get("otherMerchants")))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn price_of(offer: &Value) -> RawPrice {
    let discounted = offer.pointer("/price/discountedPrice");
    if let Some(text) = discounted
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
    {
        return RawPrice::text(text);
    }
    discounted
        .and_then(|p| p.get("value"))
        .and_then(Value::as_f64)
        .map(RawPrice::Amount)
        .unwrap_or_default()
}

/// Competitor offers, sorted ascending by canonical price.
pub fn competitors(state: &Value) -> Vec<CompetitorEntry> {
    let mut entries: Vec<CompetitorEntry> = merchant_offers(state)
        .iter()
        .map(|offer| {
            let merchant = offer.get("merchant");
            let name = merchant
                .and_then(|m| m.get("name"))
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(UNKNOWN_SELLER);
            let rating = merchant
                .and_then(|m| m.get("sellerScore"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            CompetitorEntry::new(name, price_of(offer), rating)
        })
        .collect();

    sort_competitors(&mut entries);
    entries
}

/// The merchant's own price as rendered in the state object
pub fn own_price(state: &Value) -> Option<RawPrice> {
    state
        .pointer("/product/price/discountedPrice/text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(RawPrice::text)
}

pub fn product_name(state: &Value) -> Option<String> {
    state
        .pointer("/product/name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ProductDetailParser {
        ProductDetailParser::new(&MarketplaceConfig::default()).unwrap()
    }

    #[test]
    fn state_is_read_from_markup() {
        let markup = r#"<script>window.__PRODUCT_DETAIL_APP_INITIAL_STATE__ = {"product":{"name":"Mug"}};</script>"#;
        let state = parser().state_from_markup(markup).unwrap();
        assert_eq!(product_name(&state).as_deref(), Some("Mug"));
    }

    #[test]
    fn nested_terminator_does_not_truncate_state() {
        let markup = r#"<script>window.__PRODUCT_DETAIL_APP_INITIAL_STATE__={"product":{"note":"a};b","a":{"b":1}}};window.x=1;</script>"#;
        let state = parser().state_from_markup(markup).unwrap();
        assert_eq!(state.pointer("/product/a/b"), Some(&json!(1)));
    }

    #[test]
    fn missing_and_malformed_state_are_distinguished() {
        assert!(matches!(
            parser().state_from_markup("<html></html>"),
            Err(ParsingError::StateBlobMissing { .. })
        ));

        let markup = "<script>window.__PRODUCT_DETAIL_APP_INITIAL_STATE__ = {product: broken};</script>";
        match parser().state_from_markup(markup) {
            Err(ParsingError::StateBlobMalformed { raw, .. }) => {
                assert_eq!(raw, "{product: broken}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn competitors_are_mapped_and_sorted() {
        let state = json!({
            "product": {
                "otherMerchants": [
                    { "merchant": { "name": "Pricey", "sellerScore": 9.1 },
                      "price": { "discountedPrice": { "text": "1.150,00 TL" } } },
                    { "merchant": {},
                      "price": { "discountedPrice": { "text": "n/a" } } },
                    { "merchant": { "name": "Cheap" },
                      "price": { "discountedPrice": { "value": 899.5 } } }
                ]
            }
        });

        let entries = competitors(&state);
        let names: Vec<&str> = entries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Cheap", "Pricey", UNKNOWN_SELLER]);
        assert_eq!(entries[0].canonical_price(), Some(899.5));
        assert_eq!(entries[0].rating, 0.0);
        assert_eq!(entries[1].rating, 9.1);
        assert_eq!(entries[2].canonical_price(), None);
    }

    #[test]
    fn top_level_offers_used_when_nested_list_is_empty() {
        let state = json!({
            "product": { "otherMerchants": [] },
            "otherMerchants": [
                { "merchant": { "name": "Root" }, "price": { "discountedPrice": { "text": "10 TL" } } }
            ]
        });
        assert_eq!(competitors(&state)[0].name, "Root");
        assert!(competitors(&json!({})).is_empty());
    }

    #[test]
    fn own_price_comes_from_discounted_text() {
        let state = json!({ "product": { "price": { "discountedPrice": { "text": "249,99 TL" } } } });
        assert_eq!(own_price(&state), Some(RawPrice::text("249,99 TL")));
        assert_eq!(own_price(&json!({ "product": {} })), None);
    }
}
