//! Parsing error types for catalog and product detail pages

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Selector chain '{chain}' has no candidates")]
    EmptySelectorChain { chain: String },

    #[error("No products found on page {page_index}")]
    NoProductsFound {
        page_index: u32,
        tried_selectors: Vec<String>,
    },

    #[error("Invalid pattern for '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Result count not advertised on the listing page")]
    ResultCountMissing,

    #[error("State object '{variable}' not found in page markup")]
    StateBlobMissing { variable: String },

    #[error("State object is not valid JSON: {reason}")]
    StateBlobMalformed { reason: String, raw: String },
}

impl ParsingError {
    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub const fn no_products_found(page_index: u32, tried_selectors: Vec<String>) -> Self {
        Self::NoProductsFound {
            page_index,
            tried_selectors,
        }
    }

    pub fn state_blob_malformed(reason: impl ToString, raw: impl Into<String>) -> Self {
        Self::StateBlobMalformed {
            reason: reason.to_string(),
            raw: raw.into(),
        }
    }

    /// Configuration problems cannot be fixed by retrying or skipping a page.
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelector { .. } | Self::EmptySelectorChain { .. } | Self::InvalidPattern { .. }
        )
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
