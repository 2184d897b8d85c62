// src/services/listing.rs

//! Listing page fetch and extraction.
//!
//! Turns one feed page into `(entries, next page link)` using configured CSS
//! selectors, and classifies the failure modes callers care about:
//! bot-detection walls, pages without any entries, and plain fetch errors.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Entry, ListingSelectors};
use crate::utils::resolve_url;

/// Entries and pagination hint extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub next_url: Option<String>,
}

/// Source of listing pages.
///
/// Errors are distinguished by kind: [`AppError::Blocked`] for bot-detection
/// pages, [`AppError::EmptyPage`] when nothing could be extracted, anything
/// else is a fetch failure.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Page>;
}

/// Page source that fetches over HTTP and extracts with `scraper`.
pub struct HttpPageSource {
    client: Client,
    selectors: CompiledSelectors,
}

impl HttpPageSource {
    /// Create a page source, parsing every selector once up front.
    pub fn new(client: Client, selectors: ListingSelectors) -> Result<Self> {
        Ok(Self {
            client,
            selectors: CompiledSelectors::parse(selectors)?,
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, url: &str) -> Result<Page> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| AppError::fetch(url, e))?;

        log::debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        interpret_response(url, status, &body, &self.selectors)
    }
}

/// Classify a fetched page into entries or one of the page error kinds.
pub fn interpret_response(
    url: &str,
    status: StatusCode,
    body: &str,
    selectors: &CompiledSelectors,
) -> Result<Page> {
    let base = Url::parse(url)?;
    let page = extract_page(body, &base, selectors);

    if page.entries.is_empty() && is_blocked(body, &selectors.config.blocked_markers) {
        return Err(AppError::Blocked {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(AppError::fetch(url, format!("HTTP {status}")));
    }
    if page.entries.is_empty() {
        return Err(AppError::EmptyPage {
            url: url.to_string(),
        });
    }
    Ok(page)
}

/// Whether the page body contains any bot-detection marker.
pub fn is_blocked(body: &str, markers: &[String]) -> bool {
    let haystack = body.to_lowercase();
    markers
        .iter()
        .map(|m| m.trim().to_lowercase())
        .any(|m| !m.is_empty() && haystack.contains(&m))
}

/// Extract listing entries and the next-page link from HTML.
pub fn extract_page(html: &str, base: &Url, selectors: &CompiledSelectors) -> Page {
    let document = Html::parse_document(html);

    let entries = document
        .select(&selectors.item)
        .filter_map(|card| extract_entry(card, selectors, base))
        .collect();

    let next_url = selectors
        .next
        .as_ref()
        .and_then(|sel| document.select(sel).next())
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(|href| resolve_url(base, href))
        .filter(|next| next != base.as_str());

    Page { entries, next_url }
}

fn extract_entry(card: ElementRef<'_>, selectors: &CompiledSelectors, base: &Url) -> Option<Entry> {
    let link_elem = match &selectors.link {
        Some(sel) => card.select(sel).next()?,
        None => card,
    };
    let href = link_elem.value().attr(&selectors.config.link_attr)?.trim();
    if href.is_empty() {
        return None;
    }

    let image = card
        .select(&selectors.image)
        .next()
        .and_then(|img| {
            img.value()
                .attr(&selectors.config.image_attr)
                .or_else(|| img.value().attr("data-src"))
        })
        .map(|src| resolve_url(base, src.trim()))
        .unwrap_or_default();

    Some(Entry::new(image, resolve_url(base, href)))
}

/// [`ListingSelectors`] with every CSS selector parsed.
pub struct CompiledSelectors {
    config: ListingSelectors,
    item: Selector,
    link: Option<Selector>,
    image: Selector,
    next: Option<Selector>,
}

impl CompiledSelectors {
    pub fn parse(config: ListingSelectors) -> Result<Self> {
        let item = parse_selector(&config.item_selector)?;
        let link = config
            .link_selector
            .as_deref()
            .map(parse_selector)
            .transpose()?;
        let image = parse_selector(&config.image_selector)?;
        let next = config
            .next_selector
            .as_deref()
            .map(parse_selector)
            .transpose()?;
        Ok(Self {
            config,
            item,
            link,
            image,
            next,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div class="grid">
            <a href="/item/AAA?pos=1"><img src="/img/a.jpg"></a>
            <a href="https://example.com/item/BBB"><img data-src="https://cdn.example.com/b.jpg"></a>
            <a href="/help">Help</a>
          </div>
          <a rel="next" href="/search?q=x&amp;cursor=abc">Next</a>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://example.com/search?q=x").unwrap()
    }

    fn defaults() -> CompiledSelectors {
        CompiledSelectors::parse(ListingSelectors::default()).unwrap()
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.card a[href]").is_ok());
        assert!(parse_selector("a[rel=next]").is_ok());
    }

    #[test]
    fn test_compile_rejects_bad_selector() {
        let selectors = ListingSelectors {
            next_selector: Some("[[invalid".into()),
            ..ListingSelectors::default()
        };
        assert!(matches!(
            CompiledSelectors::parse(selectors),
            Err(AppError::Selector { .. })
        ));
        assert!(HttpPageSource::new(Client::new(), ListingSelectors::default()).is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(matches!(
            parse_selector("[[invalid"),
            Err(AppError::Selector { .. })
        ));
    }

    #[test]
    fn test_extract_entries_and_next() {
        let page = extract_page(LISTING, &base(), &defaults());

        assert_eq!(
            page.entries,
            vec![
                Entry::new(
                    "https://example.com/img/a.jpg",
                    "https://example.com/item/AAA?pos=1"
                ),
                Entry::new(
                    "https://cdn.example.com/b.jpg",
                    "https://example.com/item/BBB"
                ),
            ]
        );
        assert_eq!(
            page.next_url.as_deref(),
            Some("https://example.com/search?q=x&cursor=abc")
        );
    }

    #[test]
    fn test_extract_with_link_selector() {
        let html = r#"
            <div class="card"><span>t</span><a class="go" href="/item/C1">x</a></div>
            <div class="card"><span>no link</span></div>
        "#;
        let selectors = ListingSelectors {
            item_selector: "div.card".into(),
            link_selector: Some("a.go".into()),
            next_selector: None,
            ..ListingSelectors::default()
        };
        let compiled = CompiledSelectors::parse(selectors).unwrap();
        let page = extract_page(html, &base(), &compiled);

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].link, "https://example.com/item/C1");
        assert_eq!(page.entries[0].image, "");
        assert_eq!(page.next_url, None);
    }

    #[test]
    fn test_interpret_blocked_page() {
        let body = "<html><body><h1>Please solve the CAPTCHA</h1></body></html>";
        let result = interpret_response(
            "https://example.com/search",
            StatusCode::FORBIDDEN,
            body,
            &defaults(),
        );
        assert!(matches!(result, Err(AppError::Blocked { .. })));
    }

    #[test]
    fn test_interpret_empty_page() {
        let result = interpret_response(
            "https://example.com/search",
            StatusCode::OK,
            "<html><body><p>Nothing here</p></body></html>",
            &defaults(),
        );
        assert!(matches!(result, Err(AppError::EmptyPage { .. })));
    }

    #[test]
    fn test_interpret_server_error() {
        let result = interpret_response(
            "https://example.com/search",
            StatusCode::INTERNAL_SERVER_ERROR,
            "oops",
            &defaults(),
        );
        assert!(matches!(result, Err(AppError::Fetch { .. })));
    }

    #[test]
    fn test_interpret_ok() {
        let page = interpret_response(
            "https://example.com/search?q=x",
            StatusCode::OK,
            LISTING,
            &defaults(),
        )
        .unwrap();
        assert_eq!(page.entries.len(), 2);
    }

    #[test]
    fn test_is_blocked_case_insensitive() {
        let markers = vec!["Unusual Traffic".to_string(), "  ".to_string()];
        assert!(is_blocked("We detected UNUSUAL traffic", &markers));
        assert!(!is_blocked("all good", &markers));
    }
}
