use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::info;
use url::Url;

use leadreach_common::{FieldSelectors, Platform, RawContentItem, ScrapingTarget};

use super::page::GenericPageScraper;
use super::mentions_any;
use crate::traits::ContentScraper;

/// Applies a target's CSS selectors to a forum page, one item per matched
/// post container. Without an `item` selector the field selectors apply to
/// the whole document. Targets without any selector are read by the generic
/// page adapter.
pub struct ForumScraper {
    page: Arc<GenericPageScraper>,
}

impl ForumScraper {
    pub fn new(page: Arc<GenericPageScraper>) -> Self {
        Self { page }
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn optional_selector(css: Option<&String>) -> Result<Option<Selector>> {
    css.filter(|s| !s.trim().is_empty())
        .map(|s| parse_selector(s))
        .transpose()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(scope: &ElementRef, selector: Option<&Selector>) -> Option<String> {
    let element = scope.select(selector?).next()?;
    let text = collapse_whitespace(&element.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

/// First link inside the post, resolved against the page URL.
fn post_link(scope: &ElementRef, base: Option<&Url>) -> Option<String> {
    let anchor = Selector::parse("a[href]").ok()?;
    let href = scope.select(&anchor).next()?.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base?.join(href).ok().map(|u| u.to_string())
}

fn has_any_selector(selectors: &FieldSelectors) -> bool {
    [
        &selectors.item,
        &selectors.title,
        &selectors.content,
        &selectors.author,
        &selectors.contact,
    ]
    .iter()
    .any(|s| s.as_deref().is_some_and(|css| !css.trim().is_empty()))
}

/// Synchronous so the parsed document never lives across an await.
fn extract_posts(html: &str, target: &ScrapingTarget, selectors: &FieldSelectors) -> Result<Vec<RawContentItem>> {
    let item = optional_selector(selectors.item.as_ref())?;
    let title = optional_selector(selectors.title.as_ref())?;
    let content = optional_selector(selectors.content.as_ref())?;
    let author = optional_selector(selectors.author.as_ref())?;
    let contact = optional_selector(selectors.contact.as_ref())?;

    let base = Url::parse(&target.url).ok();
    let document = Html::parse_document(html);

    let posts: Vec<ElementRef> = match item.as_ref() {
        Some(item) => document.select(item).collect(),
        None => vec![document.root_element()],
    };

    let mut items = Vec::new();
    for post in posts {
        let title_text = text_of(&post, title.as_ref()).unwrap_or_default();
        let mut body = match content.as_ref() {
            Some(_) => text_of(&post, content.as_ref()).unwrap_or_default(),
            None => collapse_whitespace(&post.text().collect::<String>()),
        };
        if let Some(contact_text) = text_of(&post, contact.as_ref()) {
            body.push_str("\nContact: ");
            body.push_str(&contact_text);
        }
        if title_text.is_empty() && body.is_empty() {
            continue;
        }
        if !mentions_any(&format!("{title_text}\n{body}"), &target.keywords) {
            continue;
        }

        let url = item
            .as_ref()
            .and_then(|_| post_link(&post, base.as_ref()))
            .unwrap_or_else(|| target.url.clone());
        let mut raw = RawContentItem::new(Platform::CommunityForum, url, title_text, body);
        if let Some(name) = text_of(&post, author.as_ref()) {
            raw = raw.with_author(name);
        }
        items.push(raw);
    }

    Ok(items)
}

#[async_trait]
impl ContentScraper for ForumScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        let Some(selectors) = target.selectors.as_ref().filter(|s| has_any_selector(s)) else {
            return self.page.scrape(target).await;
        };

        info!(url = %target.url, scraper = "forum", "Scraping forum page");
        let html = self.page.fetch_html(&target.url).await?;
        let items = extract_posts(&html, target, selectors)?;
        info!(url = %target.url, scraper = "forum", posts = items.len(), "Forum page scraped");
        Ok(items)
    }

    fn name(&self) -> &str {
        "forum"
    }
}
