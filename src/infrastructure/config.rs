//! Configuration infrastructure
//!
//! Settings are resolved once at start-up in three layers: built-in defaults,
//! an optional config file, then `PRICE_TRACKER__*` environment variables.
//! The resulting [`AppConfig`] is immutable and handed to every component
//! constructor; nothing reads the environment mid-pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::domain::GroupingKey;
use crate::infrastructure::parsing::config::SelectorConfig;

/// Environment variable prefix, e.g. `PRICE_TRACKER__PACING__BATCH_SIZE=10`.
pub const ENV_PREFIX: &str = "PRICE_TRACKER";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub marketplace: MarketplaceConfig,
    pub pacing: PacingConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub merge: MergeConfig,
    pub view: ViewConfig,
    pub logging: LoggingConfig,
    pub selectors: SelectorConfig,
}

/// Marketplace addressing and page conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    /// Origin relative links are resolved against
    pub base_origin: String,
    /// Catalog listing walked by the acquirer
    pub listing_url: String,
    /// Session cookies as `name=value; name2=value2`
    pub cookies: String,
    pub cookie_domain: String,
    /// Products rendered per listing page
    pub page_size: u32,
    /// Query parameter carrying the page index
    pub page_query_param: String,
    /// Word following the advertised result count ("1.234 sonuç")
    pub result_count_token: String,
    /// Global the product page assigns its state object to
    pub state_variable: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_origin: defaults::BASE_ORIGIN.to_string(),
            listing_url: defaults::LISTING_URL.to_string(),
            cookies: String::new(),
            cookie_domain: defaults::COOKIE_DOMAIN.to_string(),
            page_size: defaults::PAGE_SIZE,
            page_query_param: defaults::PAGE_QUERY_PARAM.to_string(),
            result_count_token: defaults::RESULT_COUNT_TOKEN.to_string(),
            state_variable: defaults::STATE_VARIABLE.to_string(),
        }
    }
}

impl MarketplaceConfig {
    /// Split the cookie string into `(name, value)` pairs, skipping malformed parts.
    pub fn cookie_pairs(&self) -> Vec<(String, String)> {
        self.cookies
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

/// Fixed-window pacing between product fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Products processed before each pause
    pub batch_size: usize,
    pub batch_pause_secs: u64,
    /// Wait after every navigation so late scripts can render
    pub page_settle_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            batch_pause_secs: defaults::BATCH_PAUSE_SECS,
            page_settle_ms: defaults::PAGE_SETTLE_MS,
        }
    }
}

impl PacingConfig {
    pub const fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }

    pub const fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    /// Whether the pipeline pauses after the product at `index` (0-based)
    /// out of `total`. The last product never triggers a pause.
    pub const fn pause_after(&self, index: usize, total: usize) -> bool {
        self.batch_size > 0 && (index + 1) % self.batch_size == 0 && index + 1 < total
    }
}

/// Blob store locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub catalog_file: String,
    pub competitor_file: String,
    /// Side channel for unparseable state blobs
    pub diagnostics_dir: PathBuf,
    pub product_state_dir: PathBuf,
    /// Keep every product's raw state object for offline inspection
    pub dump_product_state: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
            catalog_file: defaults::CATALOG_FILE.to_string(),
            competitor_file: defaults::COMPETITOR_FILE.to_string(),
            diagnostics_dir: PathBuf::from(defaults::DIAGNOSTICS_DIR),
            product_state_dir: PathBuf::from(defaults::PRODUCT_STATE_DIR),
            dump_product_state: false,
        }
    }
}

impl StorageConfig {
    /// Relative side-channel directories live under `data_dir`.
    pub fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.data_dir.join(dir)
        }
    }
}

/// HTTP page driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Keep the previous record of a product whose page could not be fetched
    /// instead of dropping it from the snapshot.
    pub carry_forward_on_fetch_failure: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub group_by: GroupingKey,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    /// JSON lines on every enabled output
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    pub file_name: String,
    /// Per-target level overrides, e.g. `"reqwest": "warn"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let module_filters = [
            ("reqwest", "info"),
            ("hyper", "warn"),
            ("html5ever", "warn"),
            ("selectors", "warn"),
            ("price_tracker_lib", defaults::LOG_LEVEL),
        ]
        .into_iter()
        .map(|(target, level)| (target.to_string(), level.to_string()))
        .collect();

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters,
        }
    }
}

/// Configuration manager for locating and loading settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Default location: `<user config dir>/price-tracker/config.toml`.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join("price-tracker");
        Ok(config_dir.join("config.toml"))
    }

    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };
        Ok(Self { config_path })
    }

    /// Load defaults, then the config file if it exists, then the environment.
    pub fn load(&self) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to seed configuration defaults")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(self.config_path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", self.config_path))?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .context("Configuration has an unexpected shape")?;

        info!("Loaded configuration (file: {:?})", self.config_path);
        Ok(app_config)
    }
}

/// Default configuration values
pub mod defaults {
    pub const BASE_ORIGIN: &str = "https://www.trendyol.com";
    pub const LISTING_URL: &str = "https://www.trendyol.com/sr?mid=1010350&os=1";
    pub const COOKIE_DOMAIN: &str = ".trendyol.com";

    /// Products rendered per catalog page
    pub const PAGE_SIZE: u32 = 24;
    pub const PAGE_QUERY_PARAM: &str = "pi";
    pub const RESULT_COUNT_TOKEN: &str = "sonuç";
    pub const STATE_VARIABLE: &str = "__PRODUCT_DETAIL_APP_INITIAL_STATE__";

    /// Page-scan limit used by the CLI when none is given
    pub const PAGE_LIMIT: u32 = 5;

    pub const BATCH_SIZE: usize = 5;
    pub const BATCH_PAUSE_SECS: u64 = 5;
    pub const PAGE_SETTLE_MS: u64 = 1000;

    pub const DATA_DIR: &str = "data";
    pub const CATALOG_FILE: &str = "products.json";
    pub const COMPETITOR_FILE: &str = "all_competitor_prices.json";
    pub const DIAGNOSTICS_DIR: &str = "diagnostics";
    pub const PRODUCT_STATE_DIR: &str = "product_data";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 2;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE_NAME: &str = "price-tracker.log";
}
