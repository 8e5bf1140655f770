//! URL handling module for Site-Warden
//!
//! This module decides which discovered links belong to a crawl (same base
//! origin, not excluded) and normalizes URLs so that two spellings of the
//! same page compare equal for deduplication.

mod normalize;
mod scope;

pub use normalize::normalize_url;
pub use scope::is_in_scope;
