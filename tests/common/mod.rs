//! Scripted in-memory page driver and HTML fixtures shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use price_tracker_lib::application::Pipeline;
use price_tracker_lib::infrastructure::config::AppConfig;
use price_tracker_lib::infrastructure::page_driver::{DriverError, DriverLauncher, PageDriver, RenderedPage};

pub const BASE: &str = "https://www.trendyol.com";
pub const LISTING_URL: &str = "https://www.trendyol.com/sr?mid=1010350&os=1";
pub const STATE_EXPRESSION: &str = "window.__PRODUCT_DETAIL_APP_INITIAL_STATE__";

/// What the scripted sessions did, shared across launches
#[derive(Debug, Default)]
pub struct DriverLog {
    pub launches: usize,
    pub closes: usize,
    /// Most sessions open at the same time
    pub max_open: usize,
    pub visited: Vec<String>,
    pub cookies: Vec<(String, String, String)>,
}

#[derive(Clone, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, Result<String, DriverError>>,
    live_states: HashMap<String, Value>,
    launch_error: Option<DriverError>,
    log: Arc<Mutex<DriverLog>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), Ok(html.into()));
        self
    }

    pub fn failing(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(
            url.to_string(),
            Err(DriverError::Status {
                url: url.to_string(),
                status,
            }),
        );
        self
    }

    /// State object returned by script evaluation while `url` is open
    pub fn live_state(mut self, url: &str, state: Value) -> Self {
        self.live_states.insert(url.to_string(), state);
        self
    }

    pub fn unlaunchable(mut self) -> Self {
        self.launch_error = Some(DriverError::Launch("no browser available".to_string()));
        self
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, DriverLog> {
        self.log.lock().unwrap()
    }

    pub fn visited(&self) -> Vec<String> {
        self.log().visited.clone()
    }
}

struct ScriptedDriver {
    site: ScriptedSite,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<RenderedPage, DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        tokio::task::yield_now().await;
        self.site.log().visited.push(url.to_string());
        self.current = Some(url.to_string());

        match self.site.pages.get(url) {
            Some(Ok(html)) => Ok(RenderedPage {
                url: url.to_string(),
                html: html.clone(),
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(DriverError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        if script != STATE_EXPRESSION {
            return Err(DriverError::Script(format!("unexpected script: {script}")));
        }
        self.current
            .as_ref()
            .and_then(|url| self.site.live_states.get(url))
            .cloned()
            .ok_or(DriverError::ScriptUnavailable)
    }

    async fn set_cookie(&mut self, name: &str, value: &str, domain: &str) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        self.site
            .log()
            .cookies
            .push((name.to_string(), value.to_string(), domain.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.site.log().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl DriverLauncher for ScriptedSite {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        if let Some(e) = &self.launch_error {
            return Err(e.clone());
        }
        let mut log = self.log();
        log.launches += 1;
        log.max_open = log.max_open.max(log.launches - log.closes);
        drop(log);
        Ok(Box::new(ScriptedDriver {
            site: self.clone(),
            current: None,
            closed: false,
        }))
    }
}

/// Defaults with storage under `data_dir` and no pacing delays
pub fn test_config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.pacing.batch_pause_secs = 0;
    config.pacing.page_settle_ms = 0;
    config.pacing.batch_size = 2;
    config
}

pub fn pipeline(config: AppConfig, site: &ScriptedSite) -> Pipeline {
    Pipeline::new(Arc::new(config), Arc::new(site.clone())).unwrap()
}

pub fn product_url(slug: &str, id: &str) -> String {
    format!("{BASE}/acme/{slug}-p-{id}")
}

pub fn card(slug: &str, id: &str, name: &str, price: &str) -> String {
    format!(
        r#"<div class="p-card-wrppr">
             <a href="/acme/{slug}-p-{id}">
               <img class="p-card-img" src="https://cdn.example.com/{id}.jpg">
               <div class="prdct-desc-cntnr-name">{name}</div>
               <div class="prc-box-dscntd">{price}</div>
             </a>
           </div>"#
    )
}

pub fn listing(result_count: Option<u32>, cards: &[String]) -> String {
    let header = result_count
        .map(|count| format!(r#"<div class="dscrptn-V2"><h2>"kupa" araması için {count} sonuç listeleniyor</h2></div>"#))
        .unwrap_or_default();
    format!("<html><body>{header}{}</body></html>", cards.concat())
}

pub fn listing_page_url(page: u32) -> String {
    format!("{LISTING_URL}&pi={page}")
}

/// Product page carrying the state blob in its markup
pub fn detail_page(competitors: &[(&str, &str)]) -> String {
    detail_page_with_state(&state(competitors))
}

pub fn detail_page_with_state(state: &Value) -> String {
    format!(
        "<html><head><script>window.__PRODUCT_DETAIL_APP_INITIAL_STATE__ = {state};window.other = 1;</script></head><body></body></html>"
    )
}

pub fn state(competitors: &[(&str, &str)]) -> Value {
    let merchants: Vec<Value> = competitors
        .iter()
        .map(|(name, price)| {
            json!({
                "merchant": { "name": name, "sellerScore": 8.5 },
                "price": { "discountedPrice": { "text": price } }
            })
        })
        .collect();
    json!({ "product": { "otherMerchants": merchants } })
}

/// Two listing pages with three products and their detail pages
pub fn shop() -> ScriptedSite {
    ScriptedSite::new()
        .page(
            LISTING_URL,
            listing(
                Some(30),
                &[
                    card("blue-mug", "1", "Blue Mug", "100 TL"),
                    card("red-mug", "2", "Red Mug", "1.250,50 TL"),
                ],
            ),
        )
        .page(
            &listing_page_url(2),
            listing(Some(30), &[card("green-mug", "3", "Green Mug", "75 TL")]),
        )
        .page(&product_url("blue-mug", "1"), detail_page(&[("S1", "90 TL"), ("S2", "110 TL")]))
        .page(&product_url("red-mug", "2"), detail_page(&[("S3", "1.300,00 TL")]))
        .page(&product_url("green-mug", "3"), detail_page(&[]))
}
