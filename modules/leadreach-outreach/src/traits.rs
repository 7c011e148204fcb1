// Trait abstractions for the outreach pipeline's external collaborators.
//
// ContentScraper  one scrape call per target (Reddit, Serper, forum, generic page).
// LeadStore       bulk insert, lookup by phone, status and contact bookkeeping.
// SmsChannel      one send(phone, message) operation.
// FollowupSink    output boundary for deferred follow-up jobs.
//
// The pipeline only classifies failures by where they happen, so every method
// returns anyhow::Result. Mocks live in `testing`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadreach_common::{FollowupJob, Lead, OutreachStatus, RawContentItem, ScrapingTarget};

// ---------------------------------------------------------------------------
// ContentScraper
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentScraper: Send + Sync {
    async fn scrape(&self, target: &ScrapingTarget) -> Result<Vec<RawContentItem>>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// LeadStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Insert every lead as a new row. All or nothing.
    async fn insert_leads(&self, leads: &[Lead]) -> Result<()>;

    /// Most recently created lead with exactly this phone number.
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>>;

    /// Mark a successful send: status contacted (if still new), attempts + 1,
    /// timestamp and the message that went out.
    async fn record_contact(&self, lead_id: Uuid, contacted_at: DateTime<Utc>, message: &str)
        -> Result<()>;

    /// Move a lead to `status`. Returns false when the lifecycle forbids the
    /// move from the stored status (or the lead does not exist).
    async fn update_status(&self, lead_id: Uuid, status: OutreachStatus) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// SmsChannel
// ---------------------------------------------------------------------------

/// What the channel reports for one accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Provider message id, when the provider returns one.
    pub reference: Option<String>,
    pub simulated: bool,
}

#[async_trait]
pub trait SmsChannel: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<SendReceipt>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// FollowupSink
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FollowupSink: Send + Sync {
    async fn enqueue(&self, jobs: &[FollowupJob]) -> Result<()>;
}
