//! Data exchanged between the dashboard service and the presentation layer

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::dto::RunReport;
use crate::domain::aggregation::{AggregatedRow, GroupingKey};

/// Full comparison table
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub rows: Vec<AggregatedRow>,
    /// Group keys for the selection control, first-seen order: product
    /// names, or identifiers under identifier grouping
    pub products: Vec<String>,
    /// Collection time of the first stored record
    pub last_update: Option<DateTime<Utc>>,
    pub group_by: GroupingKey,
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One bar of the focused price chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub seller: String,
    pub price: Option<f64>,
    pub is_own_store: bool,
    pub cheapest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusedProduct {
    pub product_name: String,
    pub image_url: Option<String>,
    /// Sorted by price, unreadable prices last
    pub points: Vec<ChartPoint>,
}

/// Interactions emitted by the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    RefreshRequested,
    /// `product_name` is an entry of the view's selection list
    ProductSelected { product_name: String },
}

/// Notifications broadcast back to the presentation layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardUpdate {
    ViewRefreshed {
        view: DashboardView,
        report: Option<RunReport>,
    },
    RefreshFailed {
        message: String,
    },
    ProductFocused {
        product: FocusedProduct,
    },
}
