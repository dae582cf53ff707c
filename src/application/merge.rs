//! Merge & persistence: reconcile a run's records into the next snapshot

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::product::{CanonicalProductRecord, dedup_latest};
use crate::infrastructure::blob_store::{JsonBlobStore, Slot, StoreError};
use crate::infrastructure::config::MergeConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Keep the previous record for products whose page failed to load
    pub carry_forward_on_fetch_failure: bool,
}

impl From<&MergeConfig> for MergePolicy {
    fn from(config: &MergeConfig) -> Self {
        Self {
            carry_forward_on_fetch_failure: config.carry_forward_on_fetch_failure,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub records: Vec<CanonicalProductRecord>,
    pub carried_forward: usize,
    /// Previous identifiers absent from the new snapshot
    pub dropped: Vec<String>,
}

/// Build the next snapshot from this run's records.
///
/// One record per identifier, in first-seen order; a later duplicate replaces
/// the earlier one. Every new record is stamped with `run_at`. Identifiers
/// only present in `previous` are dropped, unless the policy carries forward
/// those listed in `failed` (their own older timestamp is kept).
pub fn merge(
    previous: &[CanonicalProductRecord],
    new_records: Vec<CanonicalProductRecord>,
    failed: &HashSet<String>,
    run_at: DateTime<Utc>,
    policy: MergePolicy,
) -> MergeOutcome {
    let mut records: Vec<CanonicalProductRecord> = Vec::with_capacity(new_records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for mut record in new_records {
        record.collected_at = Some(run_at);
        if let Some(&position) = positions.get(&record.id) {
            debug!("Duplicate record for {}, keeping the later one", record.id);
            records[position] = record;
        } else {
            positions.insert(record.id.clone(), records.len());
            records.push(record);
        }
    }

    let mut outcome = MergeOutcome::default();
    for old in dedup_latest(previous.to_vec()) {
        if positions.contains_key(&old.id) {
            continue;
        }
        if policy.carry_forward_on_fetch_failure && failed.contains(&old.id) {
            debug!("Carrying forward {} after fetch failure", old.id);
            positions.insert(old.id.clone(), records.len());
            records.push(old);
            outcome.carried_forward += 1;
        } else {
            outcome.dropped.push(old.id);
        }
    }

    outcome.records = records;
    outcome
}

/// Replace the competitor snapshot with `records`.
pub fn commit(store: &JsonBlobStore, records: &[CanonicalProductRecord]) -> Result<(), StoreError> {
    store.write_slot(Slot::CompetitorSnapshot, records)?;
    info!("Snapshot committed with {} record(s)", records.len());
    Ok(())
}
