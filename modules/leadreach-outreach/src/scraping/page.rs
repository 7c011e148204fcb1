use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use leadreach_common::{Platform, RawContentItem, ScrapingTarget};

use super::mentions_any;
use crate::traits::ContentScraper;

/// Fetches a page and keeps its main content as markdown, via Readability.
pub struct GenericPageScraper {
    http: reqwest::Client,
}

impl GenericPageScraper {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub(crate) async fn fetch_html(&self, url: &str) -> Result<String> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))
    }
}

pub(crate) fn main_content_markdown(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

pub(crate) fn page_title(html: &str) -> String {
    let document = Html::parse_document(html);
    Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default()
}

/// One item for the whole page, or none when the page never mentions a keyword.
pub(crate) fn page_item(html: &str, target: &ScrapingTarget) -> Option<RawContentItem> {
    let content = main_content_markdown(html, &target.url);
    if content.trim().is_empty() {
        warn!(url = %target.url, scraper = "page", "Empty content after Readability extraction");
        return None;
    }
    let title = page_title(html);
    if !mentions_any(&format!("{title}\n{content}"), &target.keywords) {
        return None;
    }
    Some(RawContentItem::new(Platform::Generic, target.url.clone(), title, content))
}

#[async_trait]
impl ContentScraper for GenericPageScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        info!(url = %target.url, scraper = "page", "Scraping URL");
        let html = self.fetch_html(&target.url).await?;
        let item = page_item(&html, target);
        info!(
            url = %target.url,
            scraper = "page",
            bytes = html.len(),
            matched = item.is_some(),
            "Scraped page"
        );
        Ok(item.into_iter().collect())
    }

    fn name(&self) -> &str {
        "page"
    }
}
