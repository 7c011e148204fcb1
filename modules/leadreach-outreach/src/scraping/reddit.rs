use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use url::Url;

use leadreach_common::{EngagementMetrics, Platform, RawContentItem, ScrapingTarget};

use crate::traits::ContentScraper;

const LISTING_LIMIT: u32 = 25;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    #[serde(default)]
    permalink: String,
    ups: Option<i64>,
    num_comments: Option<i64>,
    score: Option<i64>,
}

/// Reads a subreddit through Reddit's public JSON listings.
pub struct RedditScraper {
    http: reqwest::Client,
}

impl RedditScraper {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// `<subreddit>/search.json?q=a OR b&restrict_sr=1`, or `<subreddit>/new.json`
/// when there are no keywords.
fn listing_url(subreddit_url: &str, keywords: &[String]) -> Result<Url> {
    let base = subreddit_url.trim_end_matches('/');
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();

    if keywords.is_empty() {
        let mut url = Url::parse(&format!("{base}/new.json"))
            .with_context(|| format!("invalid subreddit url: {subreddit_url}"))?;
        url.query_pairs_mut()
            .append_pair("limit", &LISTING_LIMIT.to_string());
        return Ok(url);
    }

    let mut url = Url::parse(&format!("{base}/search.json"))
        .with_context(|| format!("invalid subreddit url: {subreddit_url}"))?;
    url.query_pairs_mut()
        .append_pair("q", &keywords.join(" OR "))
        .append_pair("restrict_sr", "1")
        .append_pair("sort", "new")
        .append_pair("limit", &LISTING_LIMIT.to_string());
    Ok(url)
}

fn into_item(post: RedditPost) -> Option<RawContentItem> {
    if post.title.trim().is_empty() && post.selftext.trim().is_empty() {
        return None;
    }
    let url = if post.permalink.starts_with("http") {
        post.permalink.clone()
    } else {
        format!("https://www.reddit.com{}", post.permalink)
    };
    let mut item = RawContentItem::new(Platform::SocialForum, url, post.title, post.selftext)
        .with_engagement(EngagementMetrics {
            upvotes: post.ups,
            comments: post.num_comments,
            score: post.score,
        });
    if let Some(author) = post.author.filter(|a| a != "[deleted]") {
        item = item.with_author(author);
    }
    Some(item)
}

#[async_trait]
impl ContentScraper for RedditScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        let url = listing_url(&target.url, &target.keywords)?;
        info!(url = %url, scraper = "reddit", "Fetching listing");

        let listing: Listing = self
            .http
            .get(url)
            .send()
            .await
            .context("Reddit request failed")?
            .error_for_status()
            .context("Reddit returned an error status")?
            .json()
            .await
            .context("Failed to parse Reddit listing")?;

        Ok(listing
            .data
            .children
            .into_iter()
            .filter_map(|child| into_item(child.data))
            .collect())
    }

    fn name(&self) -> &str {
        "reddit"
    }
}
