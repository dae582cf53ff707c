//! Services consumed by the presentation layer

pub mod dashboard_service;

pub use dashboard_service::{DashboardError, DashboardService};
