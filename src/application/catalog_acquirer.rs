//! Catalog acquisition: walk the paginated listing and collect product stubs

use tracing::{info, warn};

use super::dto::RunWarning;
use crate::domain::product::ProductStub;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::page_driver::PageDriver;
use crate::infrastructure::parsing::{
    CatalogPage, ParseContext, ParsingError, ParsingResult, ProductListParser,
};

/// Everything one acquisition produced
#[derive(Debug, Clone, Default)]
pub struct CatalogAcquisition {
    pub stubs: Vec<ProductStub>,
    pub pages_scanned: u32,
    pub warnings: Vec<RunWarning>,
}

pub struct CatalogAcquirer {
    parser: ProductListParser,
    base_origin: String,
    page_size: u32,
}

impl CatalogAcquirer {
    pub fn new(config: &AppConfig) -> ParsingResult<Self> {
        Ok(Self {
            parser: ProductListParser::new(&config.selectors, &config.marketplace)?,
            base_origin: config.marketplace.base_origin.clone(),
            page_size: config.marketplace.page_size,
        })
    }

    /// `ceil(result_count / page_size)`, at least one page, clamped to the limit.
    pub fn page_count(result_count: Option<u32>, page_size: u32, page_limit: Option<u32>) -> u32 {
        let pages = match result_count {
            Some(count) if page_size > 0 => count.div_ceil(page_size).max(1),
            _ => 1,
        };
        match page_limit {
            Some(limit) if limit > 0 && limit < pages => limit,
            _ => pages,
        }
    }

    pub async fn acquire(
        &self,
        driver: &mut dyn PageDriver,
        listing_url: &str,
        page_limit: Option<u32>,
    ) -> CatalogAcquisition {
        let mut acquisition = CatalogAcquisition::default();

        info!("Opening listing: {}", listing_url);
        let first_page = match driver.navigate(listing_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Listing could not be loaded: {}", e);
                acquisition.warnings.push(RunWarning::FetchFailure {
                    target: listing_url.to_string(),
                    reason: e.to_string(),
                });
                return acquisition;
            }
        };

        let result_count = match self.parser.parse_result_count(&first_page.html) {
            Ok(count) => {
                info!("Listing advertises {} results", count);
                Some(count)
            }
            Err(e) => {
                warn!("{}; assuming a single page", e);
                acquisition.warnings.push(RunWarning::AcquisitionWarning {
                    page: Some(1),
                    message: e.to_string(),
                });
                None
            }
        };
        let page_count = Self::page_count(result_count, self.page_size, page_limit);
        info!("Scanning {} page(s)", page_count);

        let mut first_markup = Some(first_page.html);
        for page_index in 1..=page_count {
            let markup = match first_markup.take() {
                Some(markup) => markup,
                None => {
                    let page_url = self.parser.page_url(listing_url, page_index);
                    info!("Opening page {}: {}", page_index, page_url);
                    match driver.navigate(&page_url).await {
                        Ok(page) => page.html,
                        Err(e) => {
                            warn!("Page {} could not be loaded: {}", page_index, e);
                            acquisition.warnings.push(RunWarning::FetchFailure {
                                target: page_url,
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    }
                }
            };

            acquisition.pages_scanned += 1;
            match self.parse_page(&markup, page_index) {
                Ok(page) => {
                    for dropped in &page.dropped {
                        acquisition.warnings.push(RunWarning::AcquisitionWarning {
                            page: Some(page_index),
                            message: format!(
                                "card {} dropped: missing {}",
                                dropped.index, dropped.missing_field
                            ),
                        });
                    }
                    info!("Page {}: {} product(s)", page_index, page.stubs.len());
                    acquisition.stubs.extend(page.stubs);
                }
                Err(ParsingError::NoProductsFound { tried_selectors, .. }) => {
                    warn!(
                        "No product cards on page {} (tried {}); layout may have changed, stopping",
                        page_index,
                        tried_selectors.join(", ")
                    );
                    acquisition
                        .warnings
                        .push(RunWarning::ZeroResultsWarning { page: page_index });
                    break;
                }
                Err(e) => {
                    warn!("Page {} could not be parsed: {}", page_index, e);
                    acquisition.warnings.push(RunWarning::AcquisitionWarning {
                        page: Some(page_index),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!("Acquired {} product stub(s)", acquisition.stubs.len());
        acquisition
    }

    fn parse_page(&self, markup: &str, page_index: u32) -> ParsingResult<CatalogPage> {
        let context = ParseContext::new(page_index, self.base_origin.clone());
        self.parser.parse_page(markup, &context)
    }
}
