pub mod ai;
pub mod campaign;
pub mod deps;
pub mod dispatch;
pub mod extraction;
pub mod followup;
pub mod messaging;
pub mod responses;
pub mod retry;
pub mod scoring;
pub mod scraping;
pub mod store;
pub mod templates;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use ai::{AiAdapter, AiOutcome, InterestLevel, NextAction, ReplyClassification};
pub use campaign::{run_campaign, CampaignStage};
pub use deps::{OutreachDeps, PipelineSettings};
pub use dispatch::{channel_from_credentials, DispatchReport, Dispatcher};
pub use followup::LoggingFollowupSink;
pub use responses::{handle_reply, ReplyOutcome};
pub use retry::{RetryPolicies, RetryPolicy};
pub use scraping::ScraperRegistry;
pub use store::PgLeadStore;
pub use templates::{all_templates, campaign_template};
pub use traits::{ContentScraper, FollowupSink, LeadStore, SendReceipt, SmsChannel};
