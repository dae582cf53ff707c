//! JSON documents on disk, one file per named slot
//!
//! Slot writes go to a uniquely named `<file>.<uuid>.tmp` first and are
//! renamed over the target, so a reader never sees a half-written snapshot
//! and an aborted run leaves the previous file in place.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::StorageConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {slot}: {source}")]
    Serialization {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected document shape in {slot}: {reason}")]
    UnexpectedShape { slot: String, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Product stubs from the last catalog acquisition
    Catalog,
    /// Canonical records from the last completed run
    CompetitorSnapshot,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Catalog => write!(f, "catalog"),
            Self::CompetitorSnapshot => write!(f, "competitor snapshot"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonBlobStore {
    catalog_path: PathBuf,
    competitor_path: PathBuf,
    diagnostics_dir: PathBuf,
    product_state_dir: PathBuf,
    dump_product_state: bool,
}

impl JsonBlobStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            catalog_path: storage.data_dir.join(&storage.catalog_file),
            competitor_path: storage.data_dir.join(&storage.competitor_file),
            diagnostics_dir: storage.resolve(&storage.diagnostics_dir),
            product_state_dir: storage.resolve(&storage.product_state_dir),
            dump_product_state: storage.dump_product_state,
        }
    }

    pub fn slot_path(&self, slot: Slot) -> &Path {
        match slot {
            Slot::Catalog => &self.catalog_path,
            Slot::CompetitorSnapshot => &self.competitor_path,
        }
    }

    /// Parsed document of a slot, `None` when the file does not exist.
    pub fn read_slot(&self, slot: Slot) -> Result<Option<Value>, StoreError> {
        let path = self.slot_path(slot);
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                slot: slot.to_string(),
                source,
            })
    }

    /// Replace a slot's document in one step.
    pub fn write_slot<T: Serialize + ?Sized>(&self, slot: Slot, document: &T) -> Result<(), StoreError> {
        let encoded =
            serde_json::to_vec_pretty(document).map_err(|source| StoreError::Serialization {
                slot: slot.to_string(),
                source,
            })?;

        let path = self.slot_path(slot);
        write_atomically(path, &encoded)?;
        info!("Saved {} to {}", slot, path.display());
        Ok(())
    }

    /// Keep raw text that could not be decoded, for offline inspection.
    pub fn write_diagnostic(&self, name: &str, text: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.diagnostics_dir)
            .map_err(|e| StoreError::io(&self.diagnostics_dir, e))?;
        let path = self.diagnostics_dir.join(name);
        fs::write(&path, text).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Empty the per-product state dump directory before a detail phase.
    pub fn reset_product_state_dir(&self) -> Result<(), StoreError> {
        if !self.dump_product_state {
            return Ok(());
        }
        match fs::remove_dir_all(&self.product_state_dir) {
            Ok(()) => debug!("Cleared {}", self.product_state_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&self.product_state_dir, e)),
        }
        fs::create_dir_all(&self.product_state_dir)
            .map_err(|e| StoreError::io(&self.product_state_dir, e))
    }

    pub fn dump_product_state(&self, identifier: &str, state: &Value) -> Result<Option<PathBuf>, StoreError> {
        if !self.dump_product_state {
            return Ok(None);
        }
        let path = self
            .product_state_dir
            .join(format!("product_state_{identifier}.json"));
        let encoded = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Serialization {
            slot: path.display().to_string(),
            source,
        })?;
        fs::create_dir_all(&self.product_state_dir)
            .map_err(|e| StoreError::io(&self.product_state_dir, e))?;
        fs::write(&path, encoded).map_err(|e| StoreError::io(&path, e))?;
        Ok(Some(path))
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    // One temp file per write; concurrent writers never share it.
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let temp_path = PathBuf::from(temp_name);

    let written = File::create(&temp_path)
        .and_then(|mut file| file.write_all(bytes).and_then(|()| file.sync_all()))
        .map_err(|e| StoreError::io(&temp_path, e))
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e)));

    if written.is_err() {
        match fs::remove_file(&temp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!("Could not remove {}: {}", temp_path.display(), e);
            }
            _ => {}
        }
    }
    written
}
