//! Price normalization for the marketplace's locale
//!
//! Listing and detail pages render prices as `1.234,56 TL`: `.` groups
//! thousands, `,` separates decimals and the currency marker trails the
//! amount. Only that convention is understood here.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Currency markers stripped from the end of a rendered price.
const CURRENCY_MARKERS: &[&str] = &["TL", "TRY", "₺"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceParseError {
    #[error("price text is empty")]
    EmptyInput,

    #[error("price text '{raw}' is not a number")]
    Malformed { raw: String },
}

/// Convert a locale-formatted price string into its numeric value.
///
/// `None`, empty and whitespace-only input fail with
/// [`PriceParseError::EmptyInput`]; anything that is not a finite number once
/// the currency marker and separators are stripped fails with
/// [`PriceParseError::Malformed`].
pub fn normalize(raw: Option<&str>) -> Result<f64, PriceParseError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(PriceParseError::EmptyInput);
    }

    let amount = strip_currency(raw);
    let canonical = canonical_digits(amount);

    match canonical.parse::<f64>() {
        Ok(value) if value.is_finite() && !canonical.is_empty() => Ok(value),
        _ => Err(PriceParseError::Malformed {
            raw: raw.to_string(),
        }),
    }
}

fn strip_currency(raw: &str) -> &str {
    let mut amount = raw.trim();
    loop {
        let before = amount;
        for marker in CURRENCY_MARKERS {
            if let Some(stripped) = amount.strip_suffix(marker) {
                amount = stripped.trim_end();
            }
        }
        if before == amount {
            return amount;
        }
    }
}

/// Rewrite `1.234,56` into `1234.56`.
///
/// Without a decimal comma, a single dot that is not followed by exactly three
/// digits is taken as a decimal point so already-normalized values such as
/// `1234.5` parse to themselves.
fn canonical_digits(amount: &str) -> String {
    let compact: String = amount.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.contains(',') {
        return compact.replace('.', "").replace(',', ".");
    }

    let dots = compact.matches('.').count();
    if dots == 1 {
        let fraction_len = compact.rsplit('.').next().map_or(0, str::len);
        if fraction_len != 3 {
            return compact;
        }
    }
    compact.replace('.', "")
}

/// Price as it appears in scraped data or in a stored document.
///
/// Pages render text (`"1.299,90 TL"`), older store files sometimes hold a
/// bare number, and state blobs wrap the text in `{ "text": ... }`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrice {
    Text(String),
    Amount(f64),
}

impl RawPrice {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Canonical numeric value, if the price can be read at all.
    pub fn canonical(&self) -> Result<f64, PriceParseError> {
        match self {
            Self::Text(text) => normalize(Some(text)),
            Self::Amount(value) if value.is_finite() => Ok(*value),
            Self::Amount(value) => Err(PriceParseError::Malformed {
                raw: value.to_string(),
            }),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

impl Default for RawPrice {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for RawPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Amount(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for RawPrice {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for RawPrice {
    fn from(value: f64) -> Self {
        Self::Amount(value)
    }
}

impl Serialize for RawPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Amount(value) => serializer.serialize_f64(*value),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPriceRepr {
    Text(String),
    Amount(f64),
    Wrapped { text: String },
    Null(()),
}

impl<'de> Deserialize<'de> for RawPrice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawPriceRepr::deserialize(deserializer)? {
            RawPriceRepr::Text(text) | RawPriceRepr::Wrapped { text } => Self::Text(text),
            RawPriceRepr::Amount(value) => Self::Amount(value),
            RawPriceRepr::Null(()) => Self::default(),
        })
    }
}
