//! Reading the blob store back into canonical records
//!
//! The competitor snapshot is authoritative when present and array-shaped;
//! otherwise the catalog slot's stubs are promoted to records without
//! competitors.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::product::{CanonicalProductRecord, ProductStub, dedup_latest, sort_competitors};
use crate::domain::product_url::{absolutize, derive_identifier, synthesize};
use crate::infrastructure::blob_store::{JsonBlobStore, Slot, StoreError};

/// Slot contents as found on disk
enum StoreDocument {
    CompetitorSnapshot(Vec<CanonicalProductRecord>),
    Catalog(Vec<ProductStub>),
    Empty,
}

impl StoreDocument {
    /// Normalized records, one per identifier.
    fn into_records(self, base_origin: &str) -> Vec<CanonicalProductRecord> {
        let records: Vec<CanonicalProductRecord> = match self {
            Self::CompetitorSnapshot(records) => records
                .into_iter()
                .filter_map(|record| normalize_record(record, base_origin))
                .collect(),
            Self::Catalog(stubs) => stubs
                .into_iter()
                .filter_map(|stub| record_from_stub(stub, base_origin))
                .collect(),
            Self::Empty => Vec::new(),
        };

        let total = records.len();
        let records = dedup_latest(records);
        if records.len() < total {
            warn!("Collapsed {} duplicate record(s) by identifier", total - records.len());
        }
        records
    }
}

/// Canonical records for the view, following the slot precedence rule.
pub fn load_records(store: &JsonBlobStore, base_origin: &str) -> Result<Vec<CanonicalProductRecord>, StoreError> {
    let document = read_document(store)?;
    let records = document.into_records(base_origin);
    info!("Loaded {} record(s) from the store", records.len());
    Ok(records)
}

/// Stubs saved by the last catalog acquisition, `None` if there is no catalog.
pub fn load_catalog(store: &JsonBlobStore) -> Result<Option<Vec<ProductStub>>, StoreError> {
    match store.read_slot(Slot::Catalog)? {
        Some(Value::Array(items)) => Ok(Some(decode_items(items, Slot::Catalog))),
        Some(_) => Err(StoreError::UnexpectedShape {
            slot: Slot::Catalog.to_string(),
            reason: "expected an array of products".to_string(),
        }),
        None => Ok(None),
    }
}

fn read_document(store: &JsonBlobStore) -> Result<StoreDocument, StoreError> {
    match store.read_slot(Slot::CompetitorSnapshot) {
        Ok(Some(Value::Array(items))) => {
            return Ok(StoreDocument::CompetitorSnapshot(decode_items(
                items,
                Slot::CompetitorSnapshot,
            )));
        }
        Ok(Some(_)) => warn!("Competitor snapshot is not an array, falling back to catalog"),
        Ok(None) => debug!("No competitor snapshot, falling back to catalog"),
        Err(StoreError::Serialization { source, .. }) => {
            warn!("Competitor snapshot unreadable ({}), falling back to catalog", source);
        }
        Err(e) => return Err(e),
    }

    match store.read_slot(Slot::Catalog) {
        Ok(Some(Value::Array(items))) => Ok(StoreDocument::Catalog(decode_items(items, Slot::Catalog))),
        Ok(Some(_)) => {
            warn!("Catalog slot is not an array, ignoring it");
            Ok(StoreDocument::Empty)
        }
        Ok(None) => Ok(StoreDocument::Empty),
        Err(StoreError::Serialization { source, .. }) => {
            warn!("Catalog slot unreadable: {}", source);
            Ok(StoreDocument::Empty)
        }
        Err(e) => Err(e),
    }
}

/// Decode array items one by one so a single bad entry does not hide the rest.
fn decode_items<T: DeserializeOwned>(items: Vec<Value>, slot: Slot) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping entry {} of {}: {}", index, slot, e);
                None
            }
        })
        .collect()
}

fn listing_url(url: &str, identifier: &str, base_origin: &str) -> String {
    absolutize(url, base_origin).unwrap_or_else(|| synthesize(base_origin, identifier))
}

fn normalize_record(mut record: CanonicalProductRecord, base_origin: &str) -> Option<CanonicalProductRecord> {
    if record.id.trim().is_empty() {
        warn!("Dropping stored record '{}' without identifier", record.name);
        return None;
    }
    record.url = listing_url(&record.url, &record.id, base_origin);
    sort_competitors(&mut record.competitors);
    Some(record)
}

fn record_from_stub(stub: ProductStub, base_origin: &str) -> Option<CanonicalProductRecord> {
    let Some(identifier) = stub
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| derive_identifier(&stub.url))
    else {
        warn!("Dropping catalog entry '{}' without identifier", stub.name);
        return None;
    };

    let url = listing_url(&stub.url, &identifier, base_origin);
    Some(CanonicalProductRecord::new(
        identifier,
        stub.name,
        url,
        stub.image_url,
        stub.own_price.canonical().ok(),
        Vec::new(),
    ))
}
