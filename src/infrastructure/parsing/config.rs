//! Selector configuration for catalog and product pages
//!
//! Every list is an ordered candidate chain: the current markup first, then
//! search-result and alternate layouts.

use serde::{Deserialize, Serialize};

fn owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Product card containers
    pub product_card: Vec<String>,
    pub name: Vec<String>,
    pub price: Vec<String>,
    pub image: Vec<String>,
    /// Product links inside a card (the card's parent is searched as well)
    pub url: Vec<String>,
    /// Element holding the "N sonuç" result summary
    pub result_description: Vec<String>,
    /// Card attributes that may carry the product id directly
    pub identifier_attributes: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product_card: owned(&[
                ".p-card-wrppr",
                ".prdct-desc-cntnr",
                ".product-card",
                ".product-item",
                ".product-box",
            ]),
            name: owned(&[".prdct-desc-cntnr-name", "h3"]),
            price: owned(&[
                ".prc-box-dscntd",
                ".price",
                ".product-price",
                ".discounted-price",
                ".prc",
                ".prc-cntnr",
            ]),
            image: owned(&[
                "img.p-card-img",
                "img.product-image",
                "img",
                ".image-container img",
                ".img-container img",
            ]),
            url: owned(&["a[href]"]),
            result_description: owned(&[".dscrptn-V2 h2", ".dscrptn h2"]),
            identifier_attributes: owned(&["data-id", "data-product-id"]),
        }
    }
}
