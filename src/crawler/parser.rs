//! Link and metadata extraction from rendered HTML
//!
//! The rendering session hands back the serialized DOM after navigation;
//! this module pulls out the hyperlinks to follow and the page's declared
//! ignore configuration.

use crate::ignore::IGNORE_META_NAME;
use scraper::{Html, Selector};
use url::Url;

/// Extracts the followable links of a rendered page as absolute URLs
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document, with relative
/// hrefs resolved against the page URL.
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and data links
/// - hrefs that do not resolve to a valid http(s) URL
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                if let Some(link) = resolve_link(href, base_url) {
                    links.push(link);
                }
            }
        }
    }

    links
}

/// Reads the page's declared ignore configuration, if any
///
/// The declaration lives in a single meta tag; its content is returned
/// verbatim for the resolver to parse.
pub fn ignore_meta_value(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(&format!("meta[name='{}']", IGNORE_META_NAME)).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.to_string())
}

/// Resolves an href against the page URL, filtering non-followable links
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    for scheme in ["javascript:", "mailto:", "tel:", "data:"] {
        if lowered.starts_with(scheme) {
            return None;
        }
    }

    let resolved = base_url.join(trimmed).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
