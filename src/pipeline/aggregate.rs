//! Multi-page collection of one topic's feed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{Entry, Topic};
use crate::services::PageSource;
use crate::utils::url::with_page_param;

/// How the next page URL is derived.
///
/// Starts as `ByParameter` and switches to `ByDetectedLink` the first time a
/// page offers a next link; it never switches back.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pagination {
    ByParameter,
    ByDetectedLink(String),
}

/// Collects a topic's entries across pages, deduplicated by identifier.
pub struct PageAggregator {
    source: Arc<dyn PageSource>,
    request_delay: Duration,
}

impl PageAggregator {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            request_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive page requests of one topic.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Fetch up to `pages_to_scan` pages of `topic`.
    ///
    /// With more than one page, a failing page is logged and skipped; when
    /// following next links the same link is tried again on the next page
    /// index. A single-page topic has nothing to fall back on, so its page
    /// error is returned.
    pub async fn collect(&self, topic: &Topic, pages_to_scan: usize) -> Result<Vec<Entry>> {
        let pages_to_scan = pages_to_scan.max(1);
        let single_page = pages_to_scan == 1;
        let name = topic.topic.as_str();

        let mut mode = Pagination::ByParameter;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for page in 1..=pages_to_scan {
            if page > 1 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let url = match &mode {
                Pagination::ByParameter => with_page_param(&topic.url, page)?,
                Pagination::ByDetectedLink(next) => next.clone(),
            };

            let fetched = match self.source.fetch_page(&url).await {
                Ok(fetched) => fetched,
                Err(e) if single_page => return Err(e),
                Err(e) => {
                    log::warn!("[{name}] page {page} failed ({url}): {e}");
                    continue;
                }
            };

            let before = entries.len();
            let total = fetched.entries.len();
            for entry in fetched.entries {
                if let Some(id) = entry.id() {
                    if seen.insert(id) {
                        entries.push(entry);
                    }
                }
            }
            log::debug!(
                "[{name}] page {page}: {} entries, {} new in this run",
                total,
                entries.len() - before
            );

            match fetched.next_url.filter(|next| *next != url) {
                Some(next) if page < pages_to_scan => {
                    if mode == Pagination::ByParameter {
                        log::debug!("[{name}] following detected next links");
                    }
                    mode = Pagination::ByDetectedLink(next);
                }
                Some(_) => {}
                None if matches!(mode, Pagination::ByDetectedLink(_)) => {
                    log::debug!("[{name}] no next link on page {page}, stopping");
                    break;
                }
                None => {}
            }
        }

        log::info!("[{name}] collected {} unique entries", entries.len());
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::Page;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Scripted {
        Listing(Vec<&'static str>, Option<&'static str>),
        Blocked,
        Empty,
    }

    /// Page source serving canned pages by URL.
    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, Scripted>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn page(mut self, url: &str, ids: Vec<&'static str>, next: Option<&'static str>) -> Self {
            self.pages.insert(url.to_string(), Scripted::Listing(ids, next));
            self
        }

        fn failing(mut self, url: &str, scripted: Scripted) -> Self {
            self.pages.insert(url.to_string(), scripted);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self, url: &str) -> Result<Page> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(Scripted::Listing(ids, next)) => Ok(Page {
                    entries: ids
                        .iter()
                        .map(|id| Entry::new("", format!("https://example.com/item/{id}")))
                        .collect(),
                    next_url: next.map(str::to_string),
                }),
                Some(Scripted::Blocked) => Err(AppError::Blocked {
                    url: url.to_string(),
                }),
                Some(Scripted::Empty) | None => Err(AppError::EmptyPage {
                    url: url.to_string(),
                }),
            }
        }
    }

    const BASE: &str = "https://example.com/search?q=x";

    fn ids(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(Entry::id)
            .map(|id| id.into_string())
            .collect()
    }

    fn topic() -> Topic {
        Topic::new("search", BASE)
    }

    #[tokio::test]
    async fn test_dedupes_within_and_across_pages() {
        let source = Arc::new(
            FakeSource::default()
                .page(BASE, vec!["a", "b", "a"], None)
                .page(&format!("{BASE}&page=2"), vec!["b", "c"], None),
        );
        let aggregator = PageAggregator::new(source.clone());

        let entries = aggregator.collect(&topic(), 2).await.unwrap();

        assert_eq!(ids(&entries), vec!["a", "b", "c"]);
        assert_eq!(
            source.requested(),
            vec![BASE.to_string(), format!("{BASE}&page=2")]
        );
    }

    #[tokio::test]
    async fn test_switches_to_detected_next_link() {
        let source = Arc::new(
            FakeSource::default()
                .page(BASE, vec!["a"], Some("https://example.com/s?cursor=2"))
                .page("https://example.com/s?cursor=2", vec!["b"], Some("https://example.com/s?cursor=3"))
                .page("https://example.com/s?cursor=3", vec!["c"], None),
        );
        let aggregator = PageAggregator::new(source.clone());

        let entries = aggregator.collect(&topic(), 5).await.unwrap();

        assert_eq!(ids(&entries), vec!["a", "b", "c"]);
        assert_eq!(source.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_respects_page_budget() {
        let source = Arc::new(
            FakeSource::default()
                .page(BASE, vec!["a"], Some("https://example.com/s?cursor=2"))
                .page("https://example.com/s?cursor=2", vec!["b"], Some("https://example.com/s?cursor=3")),
        );
        let aggregator = PageAggregator::new(source.clone());

        let entries = aggregator.collect(&topic(), 2).await.unwrap();

        assert_eq!(ids(&entries), vec!["a", "b"]);
        assert_eq!(source.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let source = Arc::new(
            FakeSource::default()
                .page(BASE, vec!["a"], None)
                .failing(&format!("{BASE}&page=2"), Scripted::Blocked)
                .page(&format!("{BASE}&page=3"), vec!["c"], None),
        );
        let aggregator = PageAggregator::new(source.clone());

        let entries = aggregator.collect(&topic(), 3).await.unwrap();

        assert_eq!(ids(&entries), vec!["a", "c"]);
        assert_eq!(source.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_in_follow_mode_retries_carried_link() {
        let source = Arc::new(
            FakeSource::default()
                .page(BASE, vec!["a"], Some("https://example.com/s?cursor=2"))
                .failing("https://example.com/s?cursor=2", Scripted::Empty),
        );
        let aggregator = PageAggregator::new(source.clone());

        let entries = aggregator.collect(&topic(), 4).await.unwrap();

        assert_eq!(ids(&entries), vec!["a"]);
        assert_eq!(
            source.requested(),
            vec![
                BASE.to_string(),
                "https://example.com/s?cursor=2".to_string(),
                "https://example.com/s?cursor=2".to_string(),
                "https://example.com/s?cursor=2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_follow_mode_recovers_after_transient_failure() {
        struct Flaky {
            failed_once: Mutex<bool>,
        }

        #[async_trait]
        impl PageSource for Flaky {
            async fn fetch_page(&self, url: &str) -> Result<Page> {
                let (id, next) = match url {
                    BASE => ("a", Some("https://example.com/s?cursor=2")),
                    _ => {
                        let mut failed = self.failed_once.lock().unwrap();
                        if !*failed {
                            *failed = true;
                            return Err(AppError::Blocked {
                                url: url.to_string(),
                            });
                        }
                        ("b", None)
                    }
                };
                Ok(Page {
                    entries: vec![Entry::new("", format!("https://example.com/item/{id}"))],
                    next_url: next.map(str::to_string),
                })
            }
        }

        let aggregator = PageAggregator::new(Arc::new(Flaky {
            failed_once: Mutex::new(false),
        }));

        let entries = aggregator.collect(&topic(), 3).await.unwrap();

        assert_eq!(ids(&entries), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_single_page_failure_propagates() {
        let source = Arc::new(FakeSource::default().failing(BASE, Scripted::Blocked));
        let aggregator = PageAggregator::new(source);

        let result = aggregator.collect(&topic(), 1).await;

        assert!(matches!(result, Err(AppError::Blocked { .. })));
    }

    #[tokio::test]
    async fn test_entries_without_id_are_ignored() {
        struct Mixed;

        #[async_trait]
        impl PageSource for Mixed {
            async fn fetch_page(&self, _url: &str) -> Result<Page> {
                Ok(Page {
                    entries: vec![
                        Entry::new("", "https://example.com/help"),
                        Entry::new("", "https://example.com/item/k1"),
                    ],
                    next_url: None,
                })
            }
        }

        let aggregator = PageAggregator::new(Arc::new(Mixed));
        let entries = aggregator.collect(&topic(), 1).await.unwrap();

        assert_eq!(ids(&entries), vec!["k1"]);
    }
}
