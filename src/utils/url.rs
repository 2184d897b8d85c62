// src/utils/url.rs

//! URL manipulation utilities.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::EntryId;

/// Query parameter rewritten for numeric pagination.
pub const PAGE_PARAM: &str = "page";

static ITEM_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/item/([A-Za-z0-9_-]+)").expect("item segment pattern is valid")
});

/// Extract the stable listing identifier from a link.
///
/// Looks for the path segment after `/item/`; query and fragment are ignored
/// so the same listing keeps its identity across tracking parameters.
///
/// # Examples
/// ```
/// use feedwatch::utils::url::extract_entry_id;
///
/// let id = extract_entry_id("https://example.com/item/ABC123?x=1").unwrap();
/// assert_eq!(id.as_str(), "ABC123");
/// ```
pub fn extract_entry_id(link: &str) -> Option<EntryId> {
    let parsed = Url::parse(link).ok()?;
    ITEM_SEGMENT
        .captures(parsed.path())
        .and_then(|caps| caps.get(1))
        .map(|m| EntryId::new(m.as_str()))
}

/// Whether a stored value looks like an absolute link rather than an id.
pub fn looks_like_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Drop query string and fragment from a link.
pub fn strip_query(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => link
            .split(['?', '#'])
            .next()
            .unwrap_or(link)
            .to_string(),
    }
}

/// URL of page `page` for numeric pagination.
///
/// Page 1 is the base URL unmodified; later pages replace any existing
/// `page` parameter.
pub fn with_page_param(base: &str, page: usize) -> crate::error::Result<String> {
    if page <= 1 {
        return Ok(base.to_string());
    }

    let mut parsed = Url::parse(base)?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(PAGE_PARAM, &page.to_string());

    Ok(parsed.to_string())
}
