//! Application layer: acquisition, extraction, merge and the run pipeline

pub mod catalog_acquirer;
pub mod detail_extractor;
pub mod dto;
pub mod merge;
pub mod pipeline;
pub mod store_reader;

pub use catalog_acquirer::{CatalogAcquirer, CatalogAcquisition};
pub use detail_extractor::{DetailExtractor, DetailOutcome};
pub use dto::{RunReport, RunWarning};
pub use merge::{MergeOutcome, MergePolicy};
pub use pipeline::{Pipeline, PipelineError, RunOptions};
