use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::price::RawPrice;

/// Seller name used when a competitor entry carries no merchant name.
pub const UNKNOWN_SELLER: &str = "Unknown Seller";

/// Product card scraped from a catalog listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStub {
    #[serde(rename = "product_id", alias = "identifier", default)]
    pub id: Option<String>,
    #[serde(rename = "product_name", alias = "name", default)]
    pub name: String,
    #[serde(rename = "product_url", alias = "url", default)]
    pub url: String,
    #[serde(rename = "my_price", alias = "ownPrice", default)]
    pub own_price: RawPrice,
    #[serde(rename = "product_image", alias = "image", default)]
    pub image_url: String,
}

/// One third-party seller offering the same listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorEntry {
    #[serde(alias = "seller", default = "unknown_seller")]
    pub name: String,
    #[serde(default)]
    pub price: RawPrice,
    #[serde(default, deserialize_with = "rating_or_zero")]
    pub rating: f64,
}

fn unknown_seller() -> String {
    UNKNOWN_SELLER.to_string()
}

fn rating_or_zero<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

impl CompetitorEntry {
    pub fn new(name: impl Into<String>, price: impl Into<RawPrice>, rating: f64) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            rating,
        }
    }

    pub fn canonical_price(&self) -> Option<f64> {
        self.price.canonical().ok()
    }
}

/// Order two optional prices ascending, unreadable prices last.
pub fn compare_prices(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable ascending sort by canonical price; unparseable prices keep their
/// relative order at the end.
pub fn sort_competitors(competitors: &mut [CompetitorEntry]) {
    competitors.sort_by(|a, b| compare_prices(a.canonical_price(), b.canonical_price()));
}

/// Collapse records sharing an identifier into one, kept at the first
/// position. The later collection timestamp wins; when either timestamp is
/// missing or they are equal, the later entry wins.
pub fn dedup_latest(records: Vec<CanonicalProductRecord>) -> Vec<CanonicalProductRecord> {
    let mut kept: Vec<CanonicalProductRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        match positions.get(&record.id) {
            Some(&position) => {
                let newer_kept = matches!(
                    (kept[position].collected_at, record.collected_at),
                    (Some(kept_at), Some(candidate_at)) if kept_at > candidate_at
                );
                if !newer_kept {
                    kept[position] = record;
                }
            }
            None => {
                positions.insert(record.id.clone(), kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

/// Merged per-product record as persisted in the competitor snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProductRecord {
    #[serde(rename = "product_id", alias = "identifier")]
    pub id: String,
    #[serde(rename = "product_name", alias = "name", default)]
    pub name: String,
    #[serde(rename = "product_url", alias = "url", default)]
    pub url: String,
    #[serde(rename = "product_image", alias = "image", default)]
    pub image_url: String,
    #[serde(
        rename = "my_price",
        alias = "ownPrice",
        default,
        with = "own_price_format"
    )]
    pub own_price: Option<f64>,
    #[serde(default)]
    pub competitors: Vec<CompetitorEntry>,
    #[serde(
        rename = "last_update",
        alias = "timestamp",
        default,
        with = "timestamp_format"
    )]
    pub collected_at: Option<DateTime<Utc>>,
}

impl CanonicalProductRecord {
    /// Competitor entries always leave this constructor price-sorted.
    pub fn new(
        id: String,
        name: String,
        url: String,
        image_url: String,
        own_price: Option<f64>,
        mut competitors: Vec<CompetitorEntry>,
    ) -> Self {
        sort_competitors(&mut competitors);
        Self {
            id,
            name,
            url,
            image_url,
            own_price,
            competitors,
            collected_at: None,
        }
    }

    pub fn cheapest_competitor(&self) -> Option<&CompetitorEntry> {
        self.competitors
            .iter()
            .find(|entry| entry.canonical_price().is_some())
    }
}

/// Own price is stored as a number but older files hold the rendered text.
mod own_price_format {
    use crate::domain::price::RawPrice;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(amount) => serializer.serialize_f64(*amount),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = Option::<RawPrice>::deserialize(deserializer)?;
        Ok(raw.and_then(|price| price.canonical().ok()))
    }
}

/// RFC 3339 on write; the legacy local `dd.mm.YYYY HH:MM:SS` form is accepted on read.
mod timestamp_format {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        Ok(parse(&text))
    }

    pub(crate) fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(text, LEGACY_FORMAT).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|ts| ts.with_timezone(&Utc))
    }
}
