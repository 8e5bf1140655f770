//! Site-Warden main entry point
//!
//! Command-line interface for the rendered-page crawl auditor. The process
//! exits 0 when every rendered page is clean and 1 when any page has
//! surviving errors.

use anyhow::Context;
use clap::Parser;
use site_warden::browser::chromium::ChromiumBrowser;
use site_warden::config::{load_options_file, CrawlerOptions, Overrides};
use site_warden::crawler::crawl;
use site_warden::report;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Site-Warden: render every page of a site and report the errors it finds
///
/// Site-Warden visits a seed URL and every reachable same-site link in a
/// headless browser, collecting navigation failures, failed requests,
/// console errors and crashes. Pages may declare known-acceptable errors
/// through a meta tag; everything else fails the run.
#[derive(Parser, Debug)]
#[command(name = "site-warden")]
#[command(version)]
#[command(about = "Crawl a site in a headless browser and report rendering errors", long_about = None)]
struct Cli {
    /// Seed URL; also defines the crawl scope
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// TOML options file; command-line flags win over it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum link-expansion hops from the seed (default: unbounded)
    #[arg(long)]
    depth: Option<u32>,

    /// Never enqueue URLs containing this substring (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclusions: Vec<String>,

    /// Per-page render timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Number of pages rendered concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Retries per page after a failed attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Delay between a failed attempt and its retry, in milliseconds
    #[arg(long, value_name = "MS")]
    retry_delay: Option<u64>,

    /// Launch the browser without its sandbox (some container setups need this)
    #[arg(long)]
    no_sandbox: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    ignore_https_errors: bool,

    /// Suppress progress output; the report and exit code are unaffected
    #[arg(long)]
    silent: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "silent")]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.silent);

    let file_options = match &cli.config {
        Some(path) => Some(
            load_options_file(path)
                .with_context(|| format!("failed to load options from {}", path.display()))?,
        ),
        None => None,
    };

    let overrides = Overrides {
        url: cli.url,
        depth: cli.depth,
        exclusions: cli.exclusions,
        timeout_ms: cli.timeout,
        concurrency: cli.concurrency,
        retries: cli.retries,
        retry_delay_ms: cli.retry_delay,
        disable_browser_sandbox: cli.no_sandbox,
        ignore_https_errors: cli.ignore_https_errors,
        silent: cli.silent,
    };
    let options = CrawlerOptions::from_sources(overrides, file_options)?;

    tracing::info!("launching headless browser");
    let browser = ChromiumBrowser::launch(&options)
        .await
        .context("failed to launch the headless browser")?;

    let result = crawl(options, Arc::new(browser)).await?;

    report::report(&result.store);
    std::process::exit(report::exit_code(&result.store));
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, silent: bool) {
    let filter = if silent {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_warden=info,warn"),
            1 => EnvFilter::new("site_warden=debug,info"),
            2 => EnvFilter::new("site_warden=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
