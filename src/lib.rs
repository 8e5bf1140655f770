//! Site-Warden: a rendered-page crawl auditor
//!
//! This crate implements a crawler that visits a seed URL and every reachable
//! same-site link in a headless browser, classifies the failures each page
//! produces while rendering (navigation errors, failed sub-requests, console
//! errors, crashes), and turns the surviving errors into a pass/fail verdict
//! suitable for CI.

pub mod browser;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod ignore;
pub mod pool;
pub mod report;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Warden operations
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Site-Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use classify::{CrawlError, ErrorKind};
pub use config::CrawlerOptions;
pub use crawler::{CrawlTask, Crawler, RunResult};
pub use report::ErrorStore;
