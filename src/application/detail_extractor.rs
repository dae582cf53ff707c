//! Detail extraction: one product page to one canonical record

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::price::RawPrice;
use crate::domain::product::{CanonicalProductRecord, ProductStub};
use crate::domain::product_url::{absolutize, derive_identifier, synthesize};
use crate::infrastructure::blob_store::JsonBlobStore;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::page_driver::{DriverError, PageDriver};
use crate::infrastructure::parsing::product_detail_parser::{
    self, ProductDetailParser,
};
use crate::infrastructure::parsing::{ParsingError, ParsingResult};

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Extracted(CanonicalProductRecord),
    /// State object unusable; the record carries catalog data only
    Degraded {
        record: CanonicalProductRecord,
        reason: String,
    },
    /// Stub cannot be processed at all (no identifier)
    Skipped { reason: String },
    FetchFailed { identifier: String, error: DriverError },
}

pub struct DetailExtractor {
    parser: ProductDetailParser,
    base_origin: String,
    store: JsonBlobStore,
}

impl DetailExtractor {
    pub fn new(config: &AppConfig, store: JsonBlobStore) -> ParsingResult<Self> {
        Ok(Self {
            parser: ProductDetailParser::new(&config.marketplace)?,
            base_origin: config.marketplace.base_origin.clone(),
            store,
        })
    }

    pub async fn extract(&self, driver: &mut dyn PageDriver, stub: &ProductStub) -> DetailOutcome {
        let Some(identifier) = stub
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| derive_identifier(&stub.url))
        else {
            warn!("Skipping '{}': no product identifier", stub.name);
            return DetailOutcome::Skipped {
                reason: format!("no identifier for '{}'", stub.name),
            };
        };

        let url = absolutize(&stub.url, &self.base_origin)
            .unwrap_or_else(|| synthesize(&self.base_origin, &identifier));

        let page = match driver.navigate(&url).await {
            Ok(page) => page,
            Err(error) => {
                warn!("Product {} could not be loaded: {}", identifier, error);
                return DetailOutcome::FetchFailed { identifier, error };
            }
        };

        let state = match self.live_state(driver).await {
            Some(state) => Ok(state),
            None => self.parser.state_from_markup(&page.html),
        };

        match state {
            Ok(state) => DetailOutcome::Extracted(self.record_from_state(identifier, url, stub, &state)),
            Err(error) => {
                let reason = self.report_state_failure(&identifier, &error);
                DetailOutcome::Degraded {
                    record: self.degraded_record(identifier, url, stub),
                    reason,
                }
            }
        }
    }

    /// State object straight from the page's script scope, when the driver has one.
    async fn live_state(&self, driver: &mut dyn PageDriver) -> Option<Value> {
        match driver.evaluate(&self.parser.state_expression()).await {
            Ok(state) if state.is_object() => {
                debug!("State object read from script scope");
                Some(state)
            }
            Ok(_) => {
                debug!("Script scope has no state object, reading markup");
                None
            }
            Err(DriverError::ScriptUnavailable) => None,
            Err(e) => {
                warn!("State evaluation failed, reading markup: {}", e);
                None
            }
        }
    }

    fn report_state_failure(&self, identifier: &str, error: &ParsingError) -> String {
        if let ParsingError::StateBlobMalformed { raw, .. } = error {
            match self
                .store
                .write_diagnostic(&format!("state_{identifier}.txt"), raw)
            {
                Ok(path) => info!("Malformed state saved to {}", path.display()),
                Err(e) => warn!("Could not save malformed state: {}", e),
            }
        }
        warn!("Product {}: {}", identifier, error);
        error.to_string()
    }

    fn record_from_state(
        &self,
        identifier: String,
        url: String,
        stub: &ProductStub,
        state: &Value,
    ) -> CanonicalProductRecord {
        if let Err(e) = self.store.dump_product_state(&identifier, state) {
            warn!("Could not dump state for {}: {}", identifier, e);
        }

        let own_price = if stub.own_price.is_blank() {
            product_detail_parser::own_price(state).unwrap_or_default()
        } else {
            stub.own_price.clone()
        };
        let name = if stub.name.trim().is_empty() {
            product_detail_parser::product_name(state).unwrap_or_default()
        } else {
            stub.name.clone()
        };

        let competitors = product_detail_parser::competitors(state);
        if competitors.is_empty() {
            warn!("No competing sellers for {}", identifier);
        } else {
            info!("{}: {} competing seller(s)", identifier, competitors.len());
        }

        CanonicalProductRecord::new(
            identifier,
            name,
            url,
            stub.image_url.clone(),
            canonical_own_price(&own_price),
            competitors,
        )
    }

    fn degraded_record(&self, identifier: String, url: String, stub: &ProductStub) -> CanonicalProductRecord {
        CanonicalProductRecord::new(
            identifier,
            stub.name.clone(),
            url,
            stub.image_url.clone(),
            canonical_own_price(&stub.own_price),
            Vec::new(),
        )
    }
}

fn canonical_own_price(raw: &RawPrice) -> Option<f64> {
    match raw.canonical() {
        Ok(price) => Some(price),
        Err(e) => {
            debug!("Own price '{}' unreadable: {}", raw, e);
            None
        }
    }
}
