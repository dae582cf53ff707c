//! HTTP page driver with rate limiting and a session cookie jar
//!
//! Fetches pages without executing scripts, so state objects are always read
//! from the markup.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info};

use super::config::HttpConfig;
use super::page_driver::{DriverError, DriverLauncher, PageDriver, RenderedPage};

pub struct HttpPageDriver {
    client: Client,
    cookies: Arc<Jar>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    page_settle: Duration,
    closed: bool,
}

impl HttpPageDriver {
    pub fn new(config: &HttpConfig, page_settle: Duration) -> Result<Self, DriverError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| DriverError::Launch(format!("Invalid user agent: {e}")))?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("tr-TR,tr;q=0.9,en;q=0.8"));

        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .cookie_provider(Arc::clone(&cookies))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DriverError::Launch(format!("Failed to create HTTP client: {e}")))?;

        let per_second = NonZeroU32::new(config.max_requests_per_second)
            .ok_or_else(|| DriverError::Launch("Rate limit must be greater than 0".to_string()))?;

        Ok(Self {
            client,
            cookies,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            page_settle,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            Err(DriverError::SessionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn navigate(&mut self, url: &str) -> Result<RenderedPage, DriverError> {
        self.ensure_open()?;
        self.rate_limiter.until_ready().await;

        info!("Fetching URL: {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DriverError::Timeout { url: url.to_string() }
            } else {
                DriverError::navigation(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| DriverError::navigation(url, format!("Failed to read body: {e}")))?;
        debug!("Fetched {} ({} chars)", final_url, html.len());

        if !self.page_settle.is_zero() {
            tokio::time::sleep(self.page_settle).await;
        }

        Ok(RenderedPage {
            url: final_url,
            html,
        })
    }

    async fn evaluate(&mut self, _script: &str) -> Result<Value, DriverError> {
        self.ensure_open()?;
        Err(DriverError::ScriptUnavailable)
    }

    async fn set_cookie(&mut self, name: &str, value: &str, domain: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let host = domain.trim_start_matches('.');
        let origin = Url::parse(&format!("https://{host}/")).map_err(|e| DriverError::Cookie {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.cookies.add_cookie_str(
            &format!("{name}={value}; Domain={domain}; Path=/"),
            &origin,
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }
}

/// Launches a fresh [`HttpPageDriver`] (and cookie jar) per run
#[derive(Debug, Clone)]
pub struct HttpDriverLauncher {
    config: HttpConfig,
    page_settle: Duration,
}

impl HttpDriverLauncher {
    pub const fn new(config: HttpConfig, page_settle: Duration) -> Self {
        Self {
            config,
            page_settle,
        }
    }
}

#[async_trait]
impl DriverLauncher for HttpDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError> {
        let driver = HttpPageDriver::new(&self.config, self.page_settle)?;
        Ok(Box::new(driver))
    }
}
