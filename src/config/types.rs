use serde::Deserialize;

/// Built-in option defaults
pub mod defaults {
    pub const TIMEOUT_MS: u64 = 60_000;
    pub const CONCURRENCY: usize = 8;
    pub const RETRIES: u32 = 2;
    pub const RETRY_DELAY_MS: u64 = 500;
}

/// Fully resolved options for one crawl run
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    /// Seed URL; also defines the crawl's base origin
    pub url: String,

    /// Maximum link-expansion hops from the seed; `None` means unbounded
    pub depth: Option<u32>,

    /// URLs containing any of these substrings are never enqueued
    pub exclusions: Vec<String>,

    /// Per-page render timeout in milliseconds
    pub timeout_ms: u64,

    /// Worker pool size
    pub concurrency: usize,

    /// Retries per page after a failed attempt
    pub retries: u32,

    /// Delay between a failed attempt and its retry, in milliseconds
    pub retry_delay_ms: u64,

    /// Launch the browser without its sandbox (needed in some containers)
    pub disable_browser_sandbox: bool,

    /// Accept invalid TLS certificates
    pub ignore_https_errors: bool,

    /// Suppress progress output
    pub silent: bool,
}

impl CrawlerOptions {
    /// Options for a seed URL with every other field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: None,
            exclusions: Vec::new(),
            timeout_ms: defaults::TIMEOUT_MS,
            concurrency: defaults::CONCURRENCY,
            retries: defaults::RETRIES,
            retry_delay_ms: defaults::RETRY_DELAY_MS,
            disable_browser_sandbox: false,
            ignore_https_errors: false,
            silent: false,
        }
    }

    /// Merges command-line overrides over file options over defaults
    ///
    /// Returns an error when neither source provides a seed URL.
    pub fn from_sources(
        overrides: Overrides,
        file: Option<FileOptions>,
    ) -> Result<Self, crate::ConfigError> {
        let file = file.unwrap_or_default();

        let url = overrides.url.or(file.url).ok_or_else(|| {
            crate::ConfigError::Validation("a crawl URL is required".to_string())
        })?;

        let mut exclusions = file.exclusions.unwrap_or_default();
        exclusions.extend(overrides.exclusions);

        Ok(Self {
            url,
            depth: overrides.depth.or(file.depth),
            exclusions,
            timeout_ms: overrides
                .timeout_ms
                .or(file.timeout_ms)
                .unwrap_or(defaults::TIMEOUT_MS),
            concurrency: overrides
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults::CONCURRENCY),
            retries: overrides
                .retries
                .or(file.retries)
                .unwrap_or(defaults::RETRIES),
            retry_delay_ms: overrides
                .retry_delay_ms
                .or(file.retry_delay_ms)
                .unwrap_or(defaults::RETRY_DELAY_MS),
            disable_browser_sandbox: overrides.disable_browser_sandbox
                || file.disable_browser_sandbox.unwrap_or(false),
            ignore_https_errors: overrides.ignore_https_errors
                || file.ignore_https_errors.unwrap_or(false),
            silent: overrides.silent || file.silent.unwrap_or(false),
        })
    }
}

/// Values taken from the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub depth: Option<u32>,
    pub exclusions: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub disable_browser_sandbox: bool,
    pub ignore_https_errors: bool,
    pub silent: bool,
}

/// Options as written in a TOML file; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileOptions {
    pub url: Option<String>,

    pub depth: Option<u32>,

    #[serde(default)]
    pub exclusions: Option<Vec<String>>,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    pub concurrency: Option<usize>,

    pub retries: Option<u32>,

    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: Option<u64>,

    #[serde(rename = "disable-browser-sandbox")]
    pub disable_browser_sandbox: Option<bool>,

    #[serde(rename = "ignore-https-errors")]
    pub ignore_https_errors: Option<bool>,

    pub silent: Option<bool>,
}
