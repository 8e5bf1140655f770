use url::Url;

/// Normalizes a URL into the string form used for deduplication
///
/// # Normalization Steps
///
/// 1. Remove the fragment (everything after `#`)
/// 2. Remove the trailing slash from the path, except for the root path
///
/// Host case-folding and empty-path handling are already performed by the
/// `url` crate during parsing. The query string is kept as given: pages that
/// differ only in query order are treated as distinct, which matches how the
/// rendering engine requests them.
///
/// # Examples
///
/// ```
/// use site_warden::url::normalize_url;
/// use url::Url;
///
/// let a = Url::parse("https://example.com/page/#section").unwrap();
/// let b = Url::parse("https://example.com/page").unwrap();
/// assert_eq!(normalize_url(&a), normalize_url(&b));
/// ```
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    url.into()
}
