//! Price Tracker - marketplace competitor price tracking
//!
//! Walks a merchant's catalog on the marketplace, reads every product page's
//! embedded state for competing sellers, keeps one canonical record per
//! product in a JSON snapshot and derives the seller comparison view.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod types;

pub use application::{Pipeline, PipelineError, RunOptions, RunReport, RunWarning};
pub use domain::{AggregatedRow, CanonicalProductRecord, GroupingKey};
pub use services::DashboardService;
