//! Page driver abstraction
//!
//! A driver renders pages for one run and is owned exclusively by that run.
//! Browser automation, a plain HTTP client and test doubles all plug in here.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Failed to launch page driver: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("HTTP {status} while loading {url}")]
    Status { url: String, status: u16 },

    #[error("Script evaluation is not available in this driver")]
    ScriptUnavailable,

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Cookie '{name}' rejected: {reason}")]
    Cookie { name: String, reason: String },

    #[error("Driver session already closed")]
    SessionClosed,
}

impl DriverError {
    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Markup of a page after navigation and rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    pub html: String,
}

#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<RenderedPage, DriverError>;

    /// Evaluate a script expression in the current page and return its value.
    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError>;

    async fn set_cookie(&mut self, name: &str, value: &str, domain: &str) -> Result<(), DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Produces one exclusively owned driver per pipeline run
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>, DriverError>;
}
