// Test mocks for the outreach pipeline.
//
// One mock per trait boundary:
// - ScriptedAgent (TextAgent)          canned model text per request purpose
// - MemoryLeadStore (LeadStore)        in-memory rows, failure injection, write counter
// - RecordingChannel (SmsChannel)      records sends, per-phone failures
// - StaticScraper (ContentScraper)     URL -> items, per-URL failures
// - FailingScraper (ContentScraper)    always errors
// - RecordingFollowupSink (FollowupSink)
//
// Plus `test_deps` to wire them with zero send spacing and no retries.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::{AiError, CompletionRequest, TextAgent};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadreach_common::{
    FollowupJob, Lead, LeadSource, OutreachStatus, Platform, RawContentItem, ScrapingTarget,
};

use crate::deps::{OutreachDeps, PipelineSettings};
use crate::retry::RetryPolicies;
use crate::scraping::ScraperRegistry;
use crate::traits::{ContentScraper, FollowupSink, LeadStore, SendReceipt, SmsChannel};

// ---------------------------------------------------------------------------
// ScriptedAgent
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Scripted {
    Text(String),
    Fail,
}

#[derive(Default)]
struct AgentState {
    queued: HashMap<&'static str, VecDeque<Scripted>>,
    sticky: HashMap<&'static str, Scripted>,
    calls: Vec<CompletionRequest>,
}

/// Answers by request purpose (`lead_extraction`, `lead_scoring`,
/// `outreach_message`, `reply_classification`). Queued answers are used
/// first, then the sticky one. Unscripted purposes get a non-retryable 400.
pub struct ScriptedAgent {
    state: Mutex<AgentState>,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AgentState::default()),
        }
    }

    pub fn respond(self, purpose: &'static str, text: &str) -> Self {
        self.state.lock().unwrap().sticky.insert(purpose, Scripted::Text(text.to_string()));
        self
    }

    pub fn respond_once(self, purpose: &'static str, text: &str) -> Self {
        self.push(purpose, Scripted::Text(text.to_string()));
        self
    }

    /// Every call for `purpose` fails with a network error.
    pub fn fail(self, purpose: &'static str) -> Self {
        self.state.lock().unwrap().sticky.insert(purpose, Scripted::Fail);
        self
    }

    pub fn fail_once(self, purpose: &'static str) -> Self {
        self.push(purpose, Scripted::Fail);
        self
    }

    fn push(&self, purpose: &'static str, answer: Scripted) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(purpose)
            .or_default()
            .push_back(answer);
    }

    pub fn calls(&self, purpose: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|r| r.purpose == purpose)
            .count()
    }

    pub fn prompts(&self, purpose: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|r| r.purpose == purpose)
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl TextAgent for ScriptedAgent {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AiError> {
        let mut state = self.state.lock().unwrap();
        let purpose = request.purpose;
        state.calls.push(request);

        let answer = state
            .queued
            .get_mut(purpose)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.sticky.get(purpose).cloned());

        match answer {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Fail) => Err(AiError::Network("scripted failure".to_string())),
            None => Err(AiError::Api {
                status: 400,
                body: format!("no scripted response for {purpose}"),
            }),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// MemoryLeadStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLeadStore {
    leads: Mutex<Vec<Lead>>,
    fail_inserts: bool,
    writes: AtomicUsize,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: Mutex::new(leads),
            ..Self::default()
        }
    }

    /// Every `insert_leads` call fails.
    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Lead> {
        self.leads.lock().unwrap().iter().find(|l| l.id == id).cloned()
    }

    /// Write calls received, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn insert_leads(&self, leads: &[Lead]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts {
            bail!("connection refused");
        }
        self.leads.lock().unwrap().extend_from_slice(leads);
        Ok(())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>> {
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|l| l.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn record_contact(
        &self,
        lead_id: Uuid,
        contacted_at: DateTime<Utc>,
        message: &str,
    ) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut leads = self.leads.lock().unwrap();
        let Some(lead) = leads.iter_mut().find(|l| l.id == lead_id) else {
            bail!("lead {lead_id} not found");
        };
        if lead.outreach_status == OutreachStatus::New {
            lead.outreach_status = OutreachStatus::Contacted;
        }
        lead.contact_attempts += 1;
        lead.last_contacted_at = Some(contacted_at);
        lead.recommended_outreach_message = message.to_string();
        Ok(())
    }

    async fn update_status(&self, lead_id: Uuid, status: OutreachStatus) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut leads = self.leads.lock().unwrap();
        Ok(leads
            .iter_mut()
            .find(|l| l.id == lead_id)
            .is_some_and(|lead| lead.transition_to(status)))
    }
}

// ---------------------------------------------------------------------------
// RecordingChannel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub phone: String,
    pub message: String,
    pub at: tokio::time::Instant,
}

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    failing: HashSet<String>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to this phone fail.
    pub fn failing_for(mut self, phone: &str) -> Self {
        self.failing.insert(phone.to_string());
        self
    }

    /// Successful sends, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsChannel for RecordingChannel {
    async fn send(&self, phone: &str, message: &str) -> Result<SendReceipt> {
        if self.failing.contains(phone) {
            bail!("carrier rejected {phone}");
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            phone: phone.to_string(),
            message: message.to_string(),
            at: tokio::time::Instant::now(),
        });
        Ok(SendReceipt {
            reference: Some(format!("SM{}", sent.len())),
            simulated: false,
        })
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ---------------------------------------------------------------------------
// Scrapers
// ---------------------------------------------------------------------------

/// URL-keyed scraper. Unregistered URLs yield nothing.
#[derive(Default)]
pub struct StaticScraper {
    targets: HashMap<String, Vec<RawContentItem>>,
    failing: HashSet<String>,
}

impl StaticScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_target(mut self, url: &str, items: Vec<RawContentItem>) -> Self {
        self.targets.insert(url.to_string(), items);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl ContentScraper for StaticScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        if self.failing.contains(&target.url) {
            bail!("HTTP 503 from {}", target.url);
        }
        Ok(self.targets.get(&target.url).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

pub struct FailingScraper;

#[async_trait]
impl ContentScraper for FailingScraper {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>> {
        bail!("connection reset by {}", target.url)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ---------------------------------------------------------------------------
// RecordingFollowupSink
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingFollowupSink {
    jobs: Mutex<Vec<FollowupJob>>,
}

impl RecordingFollowupSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<FollowupJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl FollowupSink for RecordingFollowupSink {
    async fn enqueue(&self, jobs: &[FollowupJob]) -> Result<()> {
        self.jobs.lock().unwrap().extend_from_slice(jobs);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn raw_item(url: &str, content: &str) -> RawContentItem {
    RawContentItem::new(Platform::SocialForum, url, "Homework question", content)
}

pub fn stored_lead(phone: &str, status: OutreachStatus) -> Lead {
    let mut lead = Lead::new(LeadSource::SocialForumScrape, "https://www.reddit.com/r/learnmath/1", "help");
    lead.phone = Some(phone.to_string());
    lead.outreach_status = status;
    lead.set_interest_keywords(["calculus"]);
    lead
}

/// Settings for tests: no send spacing, no retries, default branding.
pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        send_interval: Duration::ZERO,
        retries: RetryPolicies::none(),
        ..PipelineSettings::default()
    }
}

pub fn test_deps(
    agent: Arc<ScriptedAgent>,
    store: Arc<MemoryLeadStore>,
    channel: Arc<RecordingChannel>,
    scraper: Arc<dyn ContentScraper>,
    followups: Arc<RecordingFollowupSink>,
) -> OutreachDeps {
    OutreachDeps::builder()
        .agent(agent)
        .store(store)
        .channel(channel)
        .scrapers(ScraperRegistry::new(scraper))
        .followups(followups)
        .settings(test_settings())
        .build()
}
