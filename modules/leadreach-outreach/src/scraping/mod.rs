//! Scraper adapters, one per platform, and the registry that dispatches
//! targets to them.

mod forum;
mod page;
mod reddit;
mod serper;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use leadreach_common::{Platform, RawContentItem, ScrapingTarget};

use crate::traits::ContentScraper;

pub use forum::ForumScraper;
pub use page::GenericPageScraper;
pub use reddit::RedditScraper;
pub use serper::SerperScraper;

const USER_AGENT: &str = concat!("leadreach/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the adapters.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
}

/// Case-insensitive: does the text mention any keyword? No keywords matches everything.
pub(crate) fn mentions_any(text: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .any(|k| text.contains(&k.trim().to_lowercase()))
}

/// Maps each platform to its adapter. Platforms without an adapter use the
/// fallback.
#[derive(Clone)]
pub struct ScraperRegistry {
    adapters: HashMap<Platform, Arc<dyn ContentScraper>>,
    fallback: Arc<dyn ContentScraper>,
}

impl ScraperRegistry {
    pub fn new(fallback: Arc<dyn ContentScraper>) -> Self {
        Self {
            adapters: HashMap::new(),
            fallback,
        }
    }

    /// Reddit, Serper, CSS-selector forum and readability page adapters.
    pub fn standard(http: reqwest::Client, serper_api_key: Option<String>) -> Self {
        let generic = Arc::new(GenericPageScraper::new(http.clone()));
        Self::new(generic.clone())
            .with(Platform::SocialForum, Arc::new(RedditScraper::new(http.clone())))
            .with(
                Platform::SearchResults,
                Arc::new(SerperScraper::new(http, serper_api_key)),
            )
            .with(
                Platform::CommunityForum,
                Arc::new(ForumScraper::new(generic.clone())),
            )
            .with(Platform::Generic, generic)
    }

    pub fn with(mut self, platform: Platform, scraper: Arc<dyn ContentScraper>) -> Self {
        self.adapters.insert(platform, scraper);
        self
    }

    pub fn for_platform(&self, platform: Platform) -> &Arc<dyn ContentScraper> {
        self.adapters.get(&platform).unwrap_or(&self.fallback)
    }

    /// Scrape every target in order and concatenate the results. A failing
    /// target contributes nothing and does not stop the others.
    pub async fn scrape_all(&self, targets: &[ScrapingTarget]) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        for target in targets {
            let scraper = self.for_platform(target.platform);
            match scraper.scrape(target).await {
                Ok(items) => {
                    info!(
                        url = %target.url,
                        platform = %target.platform,
                        scraper = scraper.name(),
                        items = items.len(),
                        "Scraped target"
                    );
                    report.items.extend(items.into_iter().map(|mut item| {
                        item.platform = target.platform;
                        item
                    }));
                }
                Err(e) => {
                    warn!(
                        url = %target.url,
                        platform = %target.platform,
                        scraper = scraper.name(),
                        error = %e,
                        "Scrape failed, skipping target"
                    );
                    report.failed_targets += 1;
                }
            }
        }

        report
    }
}

#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub items: Vec<RawContentItem>,
    pub failed_targets: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticScraper;

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let keywords = vec!["Calculus".to_string(), "physics".to_string()];
        assert!(mentions_any("Need help with CALCULUS homework", &keywords));
        assert!(!mentions_any("What's a good laptop?", &keywords));
        assert!(mentions_any("anything", &[]));
    }

    #[tokio::test]
    async fn unregistered_platform_uses_fallback() {
        let fallback = StaticScraper::new().on_target(
            "https://blog.example.org",
            vec![RawContentItem::new(Platform::Generic, "https://blog.example.org", "t", "c")],
        );
        let registry = ScraperRegistry::new(Arc::new(fallback));

        let target = ScrapingTarget::new(Platform::CommunityForum, "https://blog.example.org", &[]);
        let report = registry.scrape_all(&[target]).await;

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].platform, Platform::CommunityForum);
    }

    #[tokio::test]
    async fn failing_target_is_isolated() {
        let scraper = StaticScraper::new()
            .failing("https://a.test")
            .on_target(
                "https://b.test",
                vec![
                    RawContentItem::new(Platform::Generic, "https://b.test/1", "t1", "c1"),
                    RawContentItem::new(Platform::Generic, "https://b.test/2", "t2", "c2"),
                ],
            );
        let registry = ScraperRegistry::new(Arc::new(scraper));

        let report = registry
            .scrape_all(&[
                ScrapingTarget::new(Platform::Generic, "https://a.test", &[]),
                ScrapingTarget::new(Platform::Generic, "https://b.test", &[]),
            ])
            .await;

        assert_eq!(report.failed_targets, 1);
        let urls: Vec<_> = report.items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.test/1", "https://b.test/2"]);
    }
}
