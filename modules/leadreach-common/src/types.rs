use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for `Lead::predicted_conversion_probability`.
pub const MAX_CONVERSION_PROBABILITY: f64 = 0.95;

/// Upper bound for `Lead::lead_score`.
pub const MAX_LEAD_SCORE: u8 = 100;

// --- Scraping ---

/// Where a scraping target lives. Older payloads used the platform names
/// (`reddit`, `google`, `forum`, `social`), which are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[serde(alias = "reddit")]
    SocialForum,
    #[serde(alias = "google")]
    SearchResults,
    #[serde(alias = "forum")]
    CommunityForum,
    #[serde(alias = "social")]
    Generic,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::SocialForum => "social_forum",
            Platform::SearchResults => "search_results",
            Platform::CommunityForum => "community_forum",
            Platform::Generic => "generic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CSS selectors for structured page scraping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelectors {
    /// Container matched once per post; other selectors apply inside it.
    pub item: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapingTarget {
    pub platform: Platform,
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<FieldSelectors>,
}

impl ScrapingTarget {
    pub fn new(platform: Platform, url: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            platform,
            url: url.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            selectors: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub upvotes: Option<i64>,
    pub comments: Option<i64>,
    pub score: Option<i64>,
}

/// One piece of scraped content. Lives only for the duration of a campaign run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContentItem {
    pub platform: Platform,
    pub url: String,
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub engagement: Option<EngagementMetrics>,
}

impl RawContentItem {
    pub fn new(
        platform: Platform,
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            url: url.into(),
            title: title.into(),
            content: content.into(),
            author: None,
            engagement: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_engagement(mut self, engagement: EngagementMetrics) -> Self {
        self.engagement = Some(engagement);
        self
    }
}

// --- Leads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    SocialForumScrape,
    SearchResults,
    ForumScrape,
    Organic,
}

impl LeadSource {
    pub fn from_platform(platform: Platform) -> Self {
        match platform {
            Platform::SocialForum => LeadSource::SocialForumScrape,
            Platform::SearchResults => LeadSource::SearchResults,
            Platform::CommunityForum => LeadSource::ForumScrape,
            Platform::Generic => LeadSource::Organic,
        }
    }

    /// Best guess from the URL alone, for candidates whose raw item is unknown.
    pub fn from_url(source_url: &str) -> Self {
        let host = url::Url::parse(source_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_else(|| source_url.to_lowercase());

        if host.ends_with("reddit.com") {
            LeadSource::SocialForumScrape
        } else if host.ends_with("stackoverflow.com") || host.contains("forum") {
            LeadSource::ForumScrape
        } else if host.contains("google.") {
            LeadSource::SearchResults
        } else {
            LeadSource::Organic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::SocialForumScrape => "social_forum_scrape",
            LeadSource::SearchResults => "search_results",
            LeadSource::ForumScrape => "forum_scrape",
            LeadSource::Organic => "organic",
        }
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "social_forum_scrape" => Ok(LeadSource::SocialForumScrape),
            "search_results" => Ok(LeadSource::SearchResults),
            "forum_scrape" => Ok(LeadSource::ForumScrape),
            "organic" => Ok(LeadSource::Organic),
            other => Err(format!("unknown lead source: {other}")),
        }
    }
}

/// Lifecycle of a lead's contact relationship.
///
/// Moves forward only (new → contacted → responded → converted). `Stopped`
/// is terminal and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachStatus {
    #[default]
    New,
    Contacted,
    Responded,
    Converted,
    Stopped,
}

impl OutreachStatus {
    fn rank(&self) -> u8 {
        match self {
            OutreachStatus::New => 0,
            OutreachStatus::Contacted => 1,
            OutreachStatus::Responded => 2,
            OutreachStatus::Converted => 3,
            OutreachStatus::Stopped => 4,
        }
    }

    pub fn can_transition_to(&self, next: OutreachStatus) -> bool {
        match (self, next) {
            (OutreachStatus::Stopped, _) => false,
            (_, OutreachStatus::Stopped) => true,
            (current, next) => next.rank() >= current.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutreachStatus::New => "new",
            OutreachStatus::Contacted => "contacted",
            OutreachStatus::Responded => "responded",
            OutreachStatus::Converted => "converted",
            OutreachStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for OutreachStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutreachStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OutreachStatus::New),
            "contacted" => Ok(OutreachStatus::Contacted),
            "responded" => Ok(OutreachStatus::Responded),
            "converted" => Ok(OutreachStatus::Converted),
            "stopped" => Ok(OutreachStatus::Stopped),
            other => Err(format!("unknown outreach status: {other}")),
        }
    }
}

/// A person identified as a candidate for outreach.
///
/// Score and probability are private so every write goes through the
/// clamping setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub source: LeadSource,
    pub source_url: String,
    pub scraped_content: String,
    pub interest_keywords: Vec<String>,
    lead_score: u8,
    predicted_conversion_probability: f64,
    pub recommended_outreach_message: String,
    pub outreach_status: OutreachStatus,
    pub contact_attempts: u32,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub campaign_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(source: LeadSource, source_url: impl Into<String>, scraped_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: None,
            phone: None,
            full_name: None,
            source,
            source_url: source_url.into(),
            scraped_content: scraped_content.into(),
            interest_keywords: Vec::new(),
            lead_score: 0,
            predicted_conversion_probability: 0.0,
            recommended_outreach_message: String::new(),
            outreach_status: OutreachStatus::New,
            contact_attempts: 0,
            last_contacted_at: None,
            campaign_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn lead_score(&self) -> u8 {
        self.lead_score
    }

    /// Store a score, clamped to 0..=100.
    pub fn set_lead_score(&mut self, score: i64) {
        self.lead_score = score.clamp(0, MAX_LEAD_SCORE as i64) as u8;
    }

    pub fn predicted_conversion_probability(&self) -> f64 {
        self.predicted_conversion_probability
    }

    /// Store a probability, clamped to 0.0..=0.95. NaN becomes 0.
    pub fn set_predicted_conversion_probability(&mut self, probability: f64) {
        self.predicted_conversion_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, MAX_CONVERSION_PROBABILITY)
        };
    }

    /// Replace interest keywords, dropping blanks and case-insensitive
    /// duplicates while keeping first-seen order.
    pub fn set_interest_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut kept: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.into().trim().to_string();
            if keyword.is_empty()
                || kept.iter().any(|k| k.eq_ignore_ascii_case(&keyword))
            {
                continue;
            }
            kept.push(keyword);
        }
        self.interest_keywords = kept;
    }

    pub fn primary_keyword(&self) -> Option<&str> {
        self.interest_keywords.first().map(String::as_str)
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// Phone if present, else email. Used to key follow-ups.
    pub fn contact_key(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.trim().is_empty()))
    }

    /// Apply a status change if the lifecycle allows it. Returns whether it applied.
    pub fn transition_to(&mut self, next: OutreachStatus) -> bool {
        if self.outreach_status == next {
            return true;
        }
        if !self.outreach_status.can_transition_to(next) {
            return false;
        }
        self.outreach_status = next;
        true
    }
}

// --- Campaigns ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachMethod {
    /// Generate messages but do not send them.
    #[serde(alias = "email")]
    MessageOnly,
    #[serde(alias = "sms")]
    DispatchOnly,
    #[default]
    Both,
}

impl OutreachMethod {
    pub fn dispatches(&self) -> bool {
        !matches!(self, OutreachMethod::MessageOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignConfig {
    pub targets: Vec<ScrapingTarget>,
    pub max_leads: usize,
    #[serde(default)]
    pub outreach_method: OutreachMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<String>,
}

impl CampaignConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_leads == 0 {
            return Err("maxLeads must be a positive integer".to_string());
        }
        if let Some(target) = self.targets.iter().find(|t| t.url.trim().is_empty()) {
            return Err(format!("target for platform {} has an empty url", target.platform));
        }
        Ok(())
    }
}

/// Opaque identifier of one campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    pub fn generate() -> Self {
        Self(format!("campaign_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignResult {
    pub campaign_id: CampaignId,
    /// Raw items scraped across all targets.
    pub leads_processed: usize,
    /// Candidates extracted, before selection.
    pub leads_identified: usize,
    pub leads_selected: usize,
    /// Leads a send was attempted for, successful or not.
    pub leads_contacted: usize,
    pub leads_delivered: usize,
    pub followups_scheduled: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for CampaignResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Campaign {} Complete ===", self.campaign_id)?;
        writeln!(f, "Items scraped:      {}", self.leads_processed)?;
        writeln!(f, "Leads identified:   {}", self.leads_identified)?;
        writeln!(f, "Leads selected:     {}", self.leads_selected)?;
        writeln!(f, "Leads contacted:    {}", self.leads_contacted)?;
        writeln!(f, "Messages delivered: {}", self.leads_delivered)?;
        writeln!(f, "Follow-ups queued:  {}", self.followups_scheduled)?;
        let elapsed = self.completed_at - self.started_at;
        writeln!(f, "Duration:           {}s", elapsed.num_seconds())
    }
}

// --- Follow-ups ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupMessageType {
    Followup,
}

/// A deferred message for an external scheduler to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupJob {
    /// Phone if known, otherwise email.
    pub lead_key: String,
    pub scheduled_for: DateTime<Utc>,
    pub message_type: FollowupMessageType,
    pub message_content: String,
}
