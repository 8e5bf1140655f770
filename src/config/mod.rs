//! Configuration for a crawl run
//!
//! Options come from the command line, optionally backed by a TOML options
//! file; command-line values win. Validation happens once, before the
//! browser is launched.

mod parser;
mod types;
mod validation;

pub use parser::load_options_file;
pub use types::{defaults, CrawlerOptions, FileOptions, Overrides};
pub use validation::validate;
