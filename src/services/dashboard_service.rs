//! Dashboard service: the boundary the presentation layer talks to
//!
//! Keeps the last built view, answers selection events from it and runs the
//! pipeline synchronously when a refresh is requested. Every update is also
//! broadcast to subscribers.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use crate::application::pipeline::{Pipeline, PipelineError, RunOptions};
use crate::application::store_reader;
use crate::domain::aggregation;
use crate::infrastructure::blob_store::StoreError;
use crate::types::dashboard_types::{
    ChartPoint, DashboardEvent, DashboardUpdate, DashboardView, FocusedProduct,
};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Refresh failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Store could not be read: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown product: {0}")]
    UnknownProduct(String),
}

pub struct DashboardService {
    pipeline: Arc<Pipeline>,
    view: Arc<RwLock<Option<DashboardView>>>,
    event_sender: broadcast::Sender<DashboardUpdate>,
    refresh_options: RunOptions,
}

impl DashboardService {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let (event_sender, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            pipeline,
            view: Arc::new(RwLock::new(None)),
            event_sender,
            refresh_options: RunOptions::default(),
        }
    }

    /// Options used for the run triggered by a refresh request
    #[must_use]
    pub fn with_refresh_options(mut self, options: RunOptions) -> Self {
        self.refresh_options = options;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.event_sender.subscribe()
    }

    /// Rebuild the view from the store and cache it.
    pub async fn load_view(&self) -> Result<DashboardView, DashboardError> {
        let config = self.pipeline.config();
        let records = store_reader::load_records(self.pipeline.store(), &config.marketplace.base_origin)?;
        let group_by = config.view.group_by;

        let rows = aggregation::build(&records, group_by);
        let view = DashboardView {
            products: aggregation::selection_list(&rows, group_by),
            last_update: records.first().and_then(|record| record.collected_at),
            rows,
            group_by,
        };

        *self.view.write().await = Some(view.clone());
        Ok(view)
    }

    /// Rows of one selection entry for the chart, from the cached view.
    pub async fn focus(&self, product_name: &str) -> Result<FocusedProduct, DashboardError> {
        let cached = self.view.read().await.clone();
        let view = match cached {
            Some(view) => view,
            None => self.load_view().await?,
        };
        focus_product(&view, product_name)
            .ok_or_else(|| DashboardError::UnknownProduct(product_name.to_string()))
    }

    pub async fn handle(&self, event: DashboardEvent) -> Result<DashboardUpdate, DashboardError> {
        let update = match event {
            DashboardEvent::RefreshRequested => {
                info!("Refresh requested");
                let report = match self.pipeline.run(&self.refresh_options).await {
                    Ok(report) => report,
                    Err(e) => {
                        self.publish(DashboardUpdate::RefreshFailed {
                            message: e.to_string(),
                        });
                        return Err(e.into());
                    }
                };
                DashboardUpdate::ViewRefreshed {
                    view: self.load_view().await?,
                    report: Some(report),
                }
            }
            DashboardEvent::ProductSelected { product_name } => DashboardUpdate::ProductFocused {
                product: self.focus(&product_name).await?,
            },
        };

        self.publish(update.clone());
        Ok(update)
    }

    fn publish(&self, update: DashboardUpdate) {
        if self.event_sender.send(update).is_err() {
            debug!("Dashboard update had no subscribers");
        }
    }
}

/// Chart data for one group of the view, price-sorted with the own listing marked.
/// `group` is an entry of the view's selection list.
pub fn focus_product(view: &DashboardView, group: &str) -> Option<FocusedProduct> {
    let rows = aggregation::focus(&view.rows, group, view.group_by);
    let first = rows.first()?;
    let image_url = Some(first.image_url.clone()).filter(|url| !url.is_empty());

    let points = rows
        .iter()
        .map(|row| ChartPoint {
            seller: row.seller.label().to_string(),
            price: row.price,
            is_own_store: row.seller.is_own_store(),
            cheapest: row.cheapest,
        })
        .collect();

    Some(FocusedProduct {
        product_name: first.product_name.clone(),
        image_url,
        points,
    })
}
