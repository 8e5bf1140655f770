use url::Url;

/// Decides whether a discovered link belongs to the crawl
///
/// A candidate is in scope when it shares the base URL's origin
/// (scheme, host and port) and no exclusion pattern occurs anywhere in its
/// string form. Exclusion patterns are plain substrings, not regular
/// expressions.
///
/// Pure function over its inputs; no I/O.
///
/// # Examples
///
/// ```
/// use site_warden::url::is_in_scope;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let candidate = Url::parse("https://example.com/docs").unwrap();
/// assert!(is_in_scope(&candidate, &base, &[]));
///
/// let foreign = Url::parse("https://other.com/docs").unwrap();
/// assert!(!is_in_scope(&foreign, &base, &[]));
/// ```
pub fn is_in_scope(candidate: &Url, base: &Url, exclusions: &[String]) -> bool {
    if candidate.scheme() != base.scheme() {
        return false;
    }

    if candidate.host_str() != base.host_str() {
        return false;
    }

    // port_or_known_default folds the explicit and implicit spellings of the
    // default port together
    if candidate.port_or_known_default() != base.port_or_known_default() {
        return false;
    }

    let candidate_str = candidate.as_str();
    !exclusions
        .iter()
        .any(|pattern| !pattern.is_empty() && candidate_str.contains(pattern.as_str()))
}
