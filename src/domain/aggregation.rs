//! Seller-level comparison rows derived from canonical records
//!
//! Rows are rebuilt on every read of the store and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::product::{CanonicalProductRecord, compare_prices};

/// Which column forms a product group for the cheapest-seller flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// Group by display name; two identifiers sharing a name share a group.
    #[default]
    ProductName,
    /// Group by identifier; the name is only a label.
    Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Seller {
    /// The merchant's own listing
    OwnStore,
    Competitor(String),
}

impl Seller {
    pub const OWN_STORE_LABEL: &'static str = "self";

    pub const fn is_own_store(&self) -> bool {
        matches!(self, Self::OwnStore)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::OwnStore => Self::OWN_STORE_LABEL,
            Self::Competitor(name) => name,
        }
    }
}

impl fmt::Display for Seller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (product, seller) pair as shown by the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub product_id: String,
    pub product_name: String,
    pub seller: Seller,
    /// `None` when the price could not be read; such rows never win.
    pub price: Option<f64>,
    pub url: String,
    pub image_url: String,
    pub collected_at: Option<DateTime<Utc>>,
    pub cheapest: bool,
}

impl AggregatedRow {
    pub fn group_key(&self, key: GroupingKey) -> &str {
        match key {
            GroupingKey::ProductName => &self.product_name,
            GroupingKey::Identifier => &self.product_id,
        }
    }
}

/// Flatten records into rows and flag the cheapest row of every group.
pub fn build(records: &[CanonicalProductRecord], key: GroupingKey) -> Vec<AggregatedRow> {
    let mut rows = Vec::with_capacity(records.iter().map(|r| r.competitors.len() + 1).sum());

    for record in records {
        rows.push(AggregatedRow {
            product_id: record.id.clone(),
            product_name: record.name.clone(),
            seller: Seller::OwnStore,
            price: record.own_price,
            url: record.url.clone(),
            image_url: record.image_url.clone(),
            collected_at: record.collected_at,
            cheapest: false,
        });

        for competitor in &record.competitors {
            rows.push(AggregatedRow {
                product_id: record.id.clone(),
                product_name: record.name.clone(),
                seller: Seller::Competitor(competitor.name.clone()),
                price: competitor.canonical_price(),
                url: record.url.clone(),
                image_url: record.image_url.clone(),
                collected_at: record.collected_at,
                cheapest: false,
            });
        }
    }

    flag_cheapest(&mut rows, key);
    rows
}

/// Mark exactly one row per group: the minimum price, first seen on ties.
/// Groups whose prices are all unreadable get no flag.
pub fn flag_cheapest(rows: &mut [AggregatedRow], key: GroupingKey) {
    let mut winners: HashMap<&str, (usize, f64)> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(price) = row.price.filter(|p| p.is_finite()) else {
            continue;
        };
        winners
            .entry(row.group_key(key))
            .and_modify(|best| {
                if price < best.1 {
                    *best = (index, price);
                }
            })
            .or_insert((index, price));
    }

    let flagged: Vec<usize> = winners.into_values().map(|(index, _)| index).collect();
    for row in rows.iter_mut() {
        row.cheapest = false;
    }
    for index in flagged {
        rows[index].cheapest = true;
    }
}

/// Distinct group keys in first-seen order, for the selection control.
pub fn selection_list(rows: &[AggregatedRow], key: GroupingKey) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .map(|row| row.group_key(key))
        .filter(|group| seen.insert(*group))
        .map(str::to_string)
        .collect()
}

/// Rows of one group, cheapest first, unreadable prices last.
pub fn focus<'a>(rows: &'a [AggregatedRow], group: &str, key: GroupingKey) -> Vec<&'a AggregatedRow> {
    let mut focused: Vec<&AggregatedRow> = rows.iter().filter(|row| row.group_key(key) == group).collect();
    focused.sort_by(|a, b| compare_prices(a.price, b.price));
    focused
}
