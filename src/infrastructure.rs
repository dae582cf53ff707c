//! Infrastructure layer: configuration, logging, page drivers, HTML parsing
//! and the JSON blob store.

pub mod blob_store;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod page_driver;
pub mod parsing;
pub mod parsing_error;

pub use blob_store::{JsonBlobStore, Slot, StoreError};
pub use config::{AppConfig, ConfigManager};
pub use http_client::{HttpDriverLauncher, HttpPageDriver};
pub use logging::{init_logging, init_logging_with_config, log_system_info};
pub use page_driver::{DriverError, DriverLauncher, PageDriver, RenderedPage};
pub use parsing::{ParsingError, ParsingResult, ProductDetailParser, ProductListParser, SelectorConfig};
