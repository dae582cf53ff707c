//! Run report returned by the pipeline

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Non-fatal events collected during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// Selector miss or missing optional field; processing continued
    AcquisitionWarning { page: Option<u32>, message: String },
    /// State object missing or malformed; a degraded record was kept
    ExtractionDegraded { identifier: String, reason: String },
    /// Navigation or network failure; the target was skipped this run
    FetchFailure { target: String, reason: String },
    /// No product cards on a page; paging stopped there
    ZeroResultsWarning { page: u32 },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcquisitionWarning {
                page: Some(page),
                message,
            } => write!(f, "page {page}: {message}"),
            Self::AcquisitionWarning { page: None, message } => write!(f, "{message}"),
            Self::ExtractionDegraded { identifier, reason } => {
                write!(f, "product {identifier} degraded: {reason}")
            }
            Self::FetchFailure { target, reason } => write!(f, "fetch failed for {target}: {reason}"),
            Self::ZeroResultsWarning { page } => write!(f, "no products on page {page}, paging stopped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_scanned: u32,
    pub stubs_acquired: usize,
    pub products_processed: usize,
    pub records_written: usize,
    pub degraded: usize,
    pub fetch_failures: usize,
    pub carried_forward: usize,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: None,
            pages_scanned: 0,
            stubs_acquired: 0,
            products_processed: 0,
            records_written: 0,
            degraded: 0,
            fetch_failures: 0,
            carried_forward: 0,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }
}
