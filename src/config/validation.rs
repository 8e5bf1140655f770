use crate::config::types::CrawlerOptions;
use crate::ConfigError;
use url::Url;

/// Validates fully resolved crawl options
pub fn validate(options: &CrawlerOptions) -> Result<(), ConfigError> {
    let url = Url::parse(&options.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("invalid seed URL '{}': {}", options.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "seed URL must be http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "seed URL '{}' has no host",
            options.url
        )));
    }

    if options.concurrency < 1 || options.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            options.concurrency
        )));
    }

    if options.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout must be >= 100ms, got {}ms",
            options.timeout_ms
        )));
    }

    Ok(())
}
