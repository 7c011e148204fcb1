//! Dependencies shared by campaign runs and the reply handler.

use std::sync::Arc;
use std::time::Duration;

use ai_client::TextAgent;
use typed_builder::TypedBuilder;

use leadreach_common::{Branding, Config};

use crate::ai::AiAdapter;
use crate::dispatch::{Dispatcher, DEFAULT_SEND_INTERVAL};
use crate::extraction::DEFAULT_BATCH_SIZE;
use crate::followup::{LoggingFollowupSink, DEFAULT_FOLLOWUP_DELAY_HOURS};
use crate::retry::RetryPolicies;
use crate::scraping::ScraperRegistry;
use crate::traits::{FollowupSink, LeadStore, SmsChannel};

/// Tunables for one deployment.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    /// Minimum spacing between two outreach sends.
    pub send_interval: Duration,
    pub followup_delay: chrono::Duration,
    pub retries: RetryPolicies,
    pub branding: Branding,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            send_interval: DEFAULT_SEND_INTERVAL,
            followup_delay: chrono::Duration::hours(DEFAULT_FOLLOWUP_DELAY_HOURS),
            retries: RetryPolicies::default(),
            branding: Branding::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.extraction_batch_size.max(1),
            send_interval: Duration::from_millis(config.send_interval_ms),
            followup_delay: chrono::Duration::hours(config.followup_delay_hours),
            retries: RetryPolicies::default(),
            branding: config.branding.clone(),
        }
    }
}

/// Everything a campaign run or reply needs, injected once at start-up.
#[derive(Clone, TypedBuilder)]
pub struct OutreachDeps {
    pub agent: Arc<dyn TextAgent>,
    pub store: Arc<dyn LeadStore>,
    pub channel: Arc<dyn SmsChannel>,
    pub scrapers: ScraperRegistry,
    #[builder(default = Arc::new(LoggingFollowupSink) as Arc<dyn FollowupSink>)]
    pub followups: Arc<dyn FollowupSink>,
    #[builder(default)]
    pub settings: PipelineSettings,
}

impl OutreachDeps {
    pub fn ai(&self) -> AiAdapter {
        AiAdapter::new(
            self.agent.clone(),
            self.settings.retries,
            self.settings.branding.clone(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.channel.clone(), self.store.clone())
            .with_send_interval(self.settings.send_interval)
            .with_retries(
                self.settings.retries.channel_send,
                self.settings.retries.store_write,
            )
    }
}
