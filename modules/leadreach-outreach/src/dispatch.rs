//! Sends outreach messages through the SMS channel, one lead at a time with a
//! minimum spacing between sends.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{info, warn};

use leadreach_common::{Lead, OutreachStatus, TwilioCredentials};
use twilio::{TwilioOptions, TwilioService};

use crate::retry::RetryPolicy;
use crate::traits::{LeadStore, SendReceipt, SmsChannel};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

pub struct TwilioChannel {
    service: TwilioService,
}

impl TwilioChannel {
    pub fn new(service: TwilioService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SmsChannel for TwilioChannel {
    async fn send(&self, phone: &str, message: &str) -> Result<SendReceipt> {
        let response = self
            .service
            .send_sms(phone, message)
            .await
            .context("Twilio send failed")?;
        Ok(SendReceipt {
            reference: Some(response.sid),
            simulated: false,
        })
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

/// Used when no channel credentials are configured. Logs and reports success.
pub struct SimulatedChannel;

#[async_trait]
impl SmsChannel for SimulatedChannel {
    async fn send(&self, phone: &str, message: &str) -> Result<SendReceipt> {
        info!(phone, message, "SMS simulated (no channel credentials)");
        Ok(SendReceipt {
            reference: None,
            simulated: true,
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

pub fn channel_from_credentials(credentials: Option<&TwilioCredentials>) -> Arc<dyn SmsChannel> {
    match credentials {
        Some(c) => Arc::new(TwilioChannel::new(TwilioService::new(TwilioOptions {
            account_sid: c.account_sid.clone(),
            auth_token: c.auth_token.clone(),
            from_number: c.from_number.clone(),
        }))),
        None => {
            warn!("Twilio credentials not configured, outreach sends will be simulated");
            Arc::new(SimulatedChannel)
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Eligible leads a send was attempted for.
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped_no_phone: usize,
}

/// A lead can be sent to only with a phone number and a message.
pub fn is_eligible(lead: &Lead) -> bool {
    lead.has_phone() && !lead.recommended_outreach_message.trim().is_empty()
}

pub struct Dispatcher {
    channel: Arc<dyn SmsChannel>,
    store: Arc<dyn LeadStore>,
    send_interval: Duration,
    send_retry: RetryPolicy,
    store_retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn SmsChannel>, store: Arc<dyn LeadStore>) -> Self {
        Self {
            channel,
            store,
            send_interval: DEFAULT_SEND_INTERVAL,
            send_retry: RetryPolicy::none(),
            store_retry: RetryPolicy::none(),
        }
    }

    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    pub fn with_retries(mut self, send: RetryPolicy, store: RetryPolicy) -> Self {
        self.send_retry = send;
        self.store_retry = store;
        self
    }

    /// Send to every eligible lead in order. One failed send never stops the
    /// loop. Successful sends move the lead to contacted in memory and in the
    /// store.
    pub async fn dispatch(&self, leads: &mut [Lead]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut last_send: Option<Instant> = None;

        for lead in leads.iter_mut() {
            if !is_eligible(lead) {
                if !lead.has_phone() {
                    report.skipped_no_phone += 1;
                }
                continue;
            }
            let Some(phone) = lead.phone.clone() else {
                continue;
            };

            if let Some(previous) = last_send {
                tokio::time::sleep_until(previous + self.send_interval).await;
            }
            last_send = Some(Instant::now());
            report.attempted += 1;

            let message = lead.recommended_outreach_message.clone();
            let sent = self
                .send_retry
                .run("sms_send", |_: &anyhow::Error| true, || {
                    self.channel.send(&phone, &message)
                })
                .await;

            match sent {
                Ok(receipt) => {
                    report.delivered += 1;
                    self.mark_contacted(lead).await;
                    info!(
                        lead_id = %lead.id,
                        channel = self.channel.name(),
                        reference = receipt.reference.as_deref().unwrap_or("-"),
                        simulated = receipt.simulated,
                        "Outreach sent"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        lead_id = %lead.id,
                        channel = self.channel.name(),
                        error = %e,
                        "Outreach send failed, continuing"
                    );
                }
            }
        }

        report
    }

    async fn mark_contacted(&self, lead: &mut Lead) {
        let now = Utc::now();
        lead.transition_to(OutreachStatus::Contacted);
        lead.contact_attempts += 1;
        lead.last_contacted_at = Some(now);

        let recorded = self
            .store_retry
            .run("record_contact", |_: &anyhow::Error| true, || {
                self.store
                    .record_contact(lead.id, now, &lead.recommended_outreach_message)
            })
            .await;
        if let Err(e) = recorded {
            warn!(lead_id = %lead.id, error = %e, "Failed to record contact in store");
        }
    }
}
