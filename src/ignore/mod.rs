//! Page-declared ignore rules
//!
//! A page may declare, through a single meta tag, which of its own errors are
//! known and acceptable. The value is a JSON object mapping an error-type key
//! to a substring pattern or a list of patterns; the literal `*` ignores
//! every error of that type on that page. Rules are resolved fresh for every
//! page and never shared between pages.
//!
//! Parsing fails open: a malformed declaration means "no rules", never a
//! crawl failure.

use crate::classify::{CrawlError, ErrorKind};
use serde_json::Value;
use std::collections::HashMap;

/// Name of the meta tag carrying the declaration
pub const IGNORE_META_NAME: &str = "site-warden-ignore";

/// Pattern that matches every error of its type
pub const WILDCARD: &str = "*";

/// Declaration keys and the error type each one names. Unknown keys are
/// dropped during resolution.
const KIND_KEYS: &[(&str, ErrorKind)] = &[
    ("navigation", ErrorKind::Navigation),
    ("request", ErrorKind::RequestFailure),
    ("console", ErrorKind::ConsoleError),
    ("crash", ErrorKind::PageCrash),
];

fn kind_for_key(key: &str) -> Option<ErrorKind> {
    KIND_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// Resolved ignore rules for one page
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    by_kind: HashMap<ErrorKind, Vec<String>>,
}

impl IgnorePatterns {
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    /// True when a pattern for the error's type matches it
    ///
    /// A pattern matches when it is the wildcard, when the error message
    /// contains it, or when the failed resource URL contains it.
    pub fn matches(&self, error: &CrawlError) -> bool {
        let Some(patterns) = self.by_kind.get(&error.kind) else {
            return false;
        };
        patterns.iter().any(|pattern| {
            pattern == WILDCARD
                || error.message.contains(pattern.as_str())
                || error
                    .failed_url
                    .as_deref()
                    .is_some_and(|url| url.contains(pattern.as_str()))
        })
    }

    /// Marks every matching error as ignored; never unmarks
    pub fn apply(&self, errors: &mut [CrawlError]) {
        if self.is_empty() {
            return;
        }
        for error in errors.iter_mut() {
            if !error.ignored && self.matches(error) {
                error.ignored = true;
                tracing::debug!(
                    "ignoring {} on {} per page declaration",
                    error.kind,
                    error.page_url
                );
            }
        }
    }
}

/// Resolves a page's declared value into per-type pattern sets
///
/// Absent value, malformed JSON, a non-object, unknown keys, non-string list
/// entries and empty patterns all degrade silently. A key left with zero
/// usable patterns is dropped entirely; an empty pattern would otherwise
/// suppress every error of its type.
pub fn resolve(meta_value: Option<&str>) -> IgnorePatterns {
    let Some(raw) = meta_value else {
        return IgnorePatterns::default();
    };

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("malformed ignore declaration, ignoring it: {}", e);
            return IgnorePatterns::default();
        }
    };

    let Value::Object(entries) = parsed else {
        tracing::warn!("ignore declaration is not a JSON object, ignoring it");
        return IgnorePatterns::default();
    };

    let mut by_kind = HashMap::new();
    for (key, value) in entries {
        let Some(kind) = kind_for_key(&key) else {
            tracing::debug!("dropping unknown ignore key '{}'", key);
            continue;
        };

        let raw_patterns: Vec<String> = match value {
            Value::String(pattern) => vec![pattern],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(pattern) => Some(pattern),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let patterns: Vec<String> = raw_patterns
            .into_iter()
            .filter(|pattern| !pattern.is_empty())
            .collect();

        if !patterns.is_empty() {
            by_kind.insert(kind, patterns);
        }
    }

    IgnorePatterns { by_kind }
}
