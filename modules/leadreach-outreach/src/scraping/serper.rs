// Google search through Serper. Each organic result becomes one item whose
// content is the result snippet.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use leadreach_common::{Platform, RawContentItem, ScrapingTarget};

use crate::traits::ContentScraper;

const SERPER_URL: &str = "https://google.serper.dev/search";
const MAX_RESULTS: usize = 20;

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

pub struct SerperScraper {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl SerperScraper {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

/// Keywords joined with spaces, restricted to the target's host unless the
/// target points at a search engine.
fn build_query(target: &ScrapingTarget) -> String {
    let mut parts: Vec<String> = target
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    let host = url::Url::parse(&target.url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()));
    if let Some(host) = host.filter(|h| !h.starts_with("google.")) {
        parts.push(format!("site:{host}"));
    }

    parts.join(" ")
}

#[async_trait]
impl ContentScraper for SerperScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("SERPER_API_KEY not configured");
        };
        let query = build_query(target);
        if query.is_empty() {
            bail!("search target {} has no keywords and no site", target.url);
        }

        info!(query = query.as_str(), scraper = "serper", "Querying search");

        let body = serde_json::json!({
            "q": query,
            "num": MAX_RESULTS,
        });

        let data: SerperResponse = self
            .http
            .post(SERPER_URL)
            .header("X-API-KEY", api_key)
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?
            .error_for_status()
            .context("Serper returned an error status")?
            .json()
            .await
            .context("Failed to parse Serper response")?;

        Ok(data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| RawContentItem::new(Platform::SearchResults, r.link, r.title, r.snippet))
            .collect())
    }

    fn name(&self) -> &str {
        "serper"
    }
}
