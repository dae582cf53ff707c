//! Pipeline orchestration
//!
//! One run owns one driver session: launched at the start, closed on every
//! exit path. Products are processed strictly one after another with a
//! fixed pause after every batch.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::catalog_acquirer::CatalogAcquirer;
use super::detail_extractor::{DetailExtractor, DetailOutcome};
use super::dto::{RunReport, RunWarning};
use super::merge::{self, MergePolicy};
use super::store_reader;
use crate::domain::product::ProductStub;
use crate::infrastructure::blob_store::{JsonBlobStore, Slot, StoreError};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::page_driver::{DriverError, DriverLauncher, PageDriver};
use crate::infrastructure::parsing::ParsingError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not start a browsing session: {0}")]
    DriverLaunch(#[source] DriverError),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("No catalog snapshot at {0}; run an acquisition first")]
    CatalogUnavailable(PathBuf),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ParsingError),
}

/// Per-run switches, mirroring the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after catalog acquisition
    pub fetch_only: bool,
    /// Skip acquisition and process the saved catalog
    pub process_only: bool,
    pub listing_url: Option<String>,
    /// Maximum number of products sent to detail extraction, 0 for all
    pub limit: Option<usize>,
    pub page_limit: Option<u32>,
}

pub struct Pipeline {
    config: Arc<AppConfig>,
    launcher: Arc<dyn DriverLauncher>,
    store: JsonBlobStore,
    acquirer: CatalogAcquirer,
    extractor: DetailExtractor,
    policy: MergePolicy,
    /// Held for a whole run; runs never overlap on one pipeline.
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: Arc<AppConfig>, launcher: Arc<dyn DriverLauncher>) -> Result<Self, PipelineError> {
        let store = JsonBlobStore::new(&config.storage);
        Ok(Self {
            acquirer: CatalogAcquirer::new(&config)?,
            extractor: DetailExtractor::new(&config, store.clone())?,
            policy: MergePolicy::from(&config.merge),
            run_lock: Mutex::new(()),
            store,
            launcher,
            config,
        })
    }

    pub const fn store(&self) -> &JsonBlobStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id);
        let _running = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(%run_id, "Another run is active, waiting");
                self.run_lock.lock().await
            }
        };
        self.run_inner(run_id, options).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new(run_id.to_string(), Utc::now());
        info!("Run started");

        let saved_catalog = if options.process_only {
            Some(self.saved_catalog()?)
        } else {
            None
        };

        if options.process_only && options.fetch_only {
            warn!("Both fetch-only and process-only requested; nothing to do");
            report.stubs_acquired = saved_catalog.map_or(0, |stubs| stubs.len());
            return Ok(finish(report));
        }

        let mut driver = self.launcher.launch().await.map_err(|e| {
            error!("Session launch failed: {}", e);
            PipelineError::DriverLaunch(e)
        })?;

        let outcome = self
            .run_session(driver.as_mut(), options, saved_catalog, &mut report)
            .await;

        if let Err(e) = driver.close().await {
            warn!("Session did not close cleanly: {}", e);
        }

        match outcome {
            Ok(()) => Ok(finish(report)),
            Err(e) => {
                error!("Run aborted: {}", e);
                Err(e)
            }
        }
    }

    fn saved_catalog(&self) -> Result<Vec<ProductStub>, PipelineError> {
        let stubs = store_reader::load_catalog(&self.store)?.ok_or_else(|| {
            PipelineError::CatalogUnavailable(self.store.slot_path(Slot::Catalog).to_path_buf())
        })?;
        info!("Loaded {} product(s) from the saved catalog", stubs.len());
        Ok(stubs)
    }

    async fn run_session(
        &self,
        driver: &mut dyn PageDriver,
        options: &RunOptions,
        saved_catalog: Option<Vec<ProductStub>>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        self.bootstrap_session(driver).await;

        let stubs = match saved_catalog {
            Some(stubs) => stubs,
            None => self.acquire_catalog(driver, options, report).await?,
        };
        report.stubs_acquired = stubs.len();

        if options.fetch_only {
            info!("Fetch-only run, skipping detail extraction");
            return Ok(());
        }

        self.detail_phase(driver, stubs, options.limit, report).await
    }

    /// Open the marketplace and install the configured session cookies.
    async fn bootstrap_session(&self, driver: &mut dyn PageDriver) {
        let marketplace = &self.config.marketplace;
        let cookies = marketplace.cookie_pairs();
        if cookies.is_empty() {
            warn!("No marketplace cookies configured; requests may be challenged");
            return;
        }

        if let Err(e) = driver.navigate(&marketplace.base_origin).await {
            warn!("Could not open {} before setting cookies: {}", marketplace.base_origin, e);
        }
        for (name, value) in &cookies {
            if let Err(e) = driver.set_cookie(name, value, &marketplace.cookie_domain).await {
                warn!("Cookie '{}' not set: {}", name, e);
            }
        }
        info!("{} session cookie(s) installed", cookies.len());
    }

    async fn acquire_catalog(
        &self,
        driver: &mut dyn PageDriver,
        options: &RunOptions,
        report: &mut RunReport,
    ) -> Result<Vec<ProductStub>, PipelineError> {
        let listing_url = options
            .listing_url
            .as_deref()
            .unwrap_or(&self.config.marketplace.listing_url);

        let acquisition = self.acquirer.acquire(driver, listing_url, options.page_limit).await;
        report.pages_scanned = acquisition.pages_scanned;
        report.warnings.extend(acquisition.warnings);

        if acquisition.stubs.is_empty() {
            warn!("Acquisition produced no products; keeping the previous catalog");
        } else {
            self.store.write_slot(Slot::Catalog, &acquisition.stubs)?;
        }
        Ok(acquisition.stubs)
    }

    async fn detail_phase(
        &self,
        driver: &mut dyn PageDriver,
        stubs: Vec<ProductStub>,
        limit: Option<usize>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        // Zero means no limit, same as the page limit.
        let selected: Vec<ProductStub> = match limit.filter(|&limit| limit > 0) {
            Some(limit) => stubs.into_iter().take(limit).collect(),
            None => stubs,
        };
        let total = selected.len();
        if total == 0 {
            warn!("No products to process; keeping the previous snapshot");
            return Ok(());
        }

        if let Err(e) = self.store.reset_product_state_dir() {
            warn!("Could not reset product state dumps: {}", e);
        }
        let previous = if self.policy.carry_forward_on_fetch_failure {
            store_reader::load_records(&self.store, &self.config.marketplace.base_origin)?
        } else {
            Vec::new()
        };

        let pacing = &self.config.pacing;
        let mut records = Vec::with_capacity(total);
        let mut failed = HashSet::new();

        for (index, stub) in selected.iter().enumerate() {
            info!("Processing {}/{} - {}", index + 1, total, stub.name);

            match self.extractor.extract(driver, stub).await {
                DetailOutcome::Extracted(record) => records.push(record),
                DetailOutcome::Degraded { record, reason } => {
                    report.degraded += 1;
                    report.warn(RunWarning::ExtractionDegraded {
                        identifier: record.id.clone(),
                        reason,
                    });
                    records.push(record);
                }
                DetailOutcome::Skipped { reason } => {
                    report.warn(RunWarning::AcquisitionWarning { page: None, message: reason });
                }
                DetailOutcome::FetchFailed { identifier, error } => {
                    report.fetch_failures += 1;
                    report.warn(RunWarning::FetchFailure {
                        target: identifier.clone(),
                        reason: error.to_string(),
                    });
                    failed.insert(identifier);
                }
            }
            report.products_processed += 1;

            if pacing.pause_after(index, total) {
                info!(
                    "Processed {} product(s), pausing {}s",
                    index + 1,
                    pacing.batch_pause_secs
                );
                tokio::time::sleep(pacing.batch_pause()).await;
            }
        }

        let outcome = merge::merge(&previous, records, &failed, report.started_at, self.policy);
        if !outcome.dropped.is_empty() {
            info!("{} product(s) no longer in the snapshot", outcome.dropped.len());
        }
        merge::commit(&self.store, &outcome.records)?;
        report.carried_forward = outcome.carried_forward;
        report.records_written = outcome.records.len();
        Ok(())
    }
}

fn finish(mut report: RunReport) -> RunReport {
    report.finished_at = Some(Utc::now());
    info!(
        pages = report.pages_scanned,
        stubs = report.stubs_acquired,
        processed = report.products_processed,
        written = report.records_written,
        degraded = report.degraded,
        fetch_failures = report.fetch_failures,
        warnings = report.warnings.len(),
        "Run finished"
    );
    report
}
