//! Types shared with the presentation layer

pub mod dashboard_types;
