use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use leadreach_common::{Branding, FollowupJob, FollowupMessageType, Lead};

use crate::traits::FollowupSink;

pub const DEFAULT_FOLLOWUP_DELAY_HOURS: i64 = 72;

pub fn followup_message(lead: &Lead, branding: &Branding) -> String {
    let topic = lead.primary_keyword().unwrap_or("your studies");
    format!(
        "Still need help with {topic}? {} offers free trials: {}",
        branding.product_name, branding.trial_url
    )
}

/// One job per lead with a phone or email, due `delay` after `now`.
pub fn plan_followups(
    leads: &[Lead],
    now: DateTime<Utc>,
    delay: Duration,
    branding: &Branding,
) -> Vec<FollowupJob> {
    leads
        .iter()
        .filter_map(|lead| {
            let key = lead.contact_key()?;
            Some(FollowupJob {
                lead_key: key.to_string(),
                scheduled_for: now + delay,
                message_type: FollowupMessageType::Followup,
                message_content: followup_message(lead, branding),
            })
        })
        .collect()
}

/// Hands follow-up jobs to the sink. A sink failure is logged; the planned
/// jobs are still returned.
pub async fn schedule_followups(
    sink: &dyn FollowupSink,
    leads: &[Lead],
    delay: Duration,
    branding: &Branding,
) -> Vec<FollowupJob> {
    let jobs = plan_followups(leads, Utc::now(), delay, branding);
    if jobs.is_empty() {
        return jobs;
    }
    if let Err(e) = sink.enqueue(&jobs).await {
        warn!(jobs = jobs.len(), error = %e, "Follow-up sink rejected jobs");
    }
    jobs
}

/// Default sink: logs each job for an external scheduler to pick up.
pub struct LoggingFollowupSink;

#[async_trait]
impl FollowupSink for LoggingFollowupSink {
    async fn enqueue(&self, jobs: &[FollowupJob]) -> Result<()> {
        for job in jobs {
            info!(
                lead_key = job.lead_key.as_str(),
                scheduled_for = %job.scheduled_for,
                message = job.message_content.as_str(),
                "Follow-up scheduled"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use leadreach_common::LeadSource;

    fn lead(phone: Option<&str>, email: Option<&str>, keyword: Option<&str>) -> Lead {
        let mut lead = Lead::new(LeadSource::Organic, "https://x.test", "c");
        lead.phone = phone.map(str::to_string);
        lead.email = email.map(str::to_string);
        if let Some(k) = keyword {
            lead.set_interest_keywords([k]);
        }
        lead
    }

    #[test]
    fn jobs_are_due_after_delay_and_keyed_by_contact() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let leads = vec![
            lead(Some("+15551234567"), Some("a@x.test"), Some("calculus")),
            lead(None, Some("b@x.test"), None),
            lead(None, None, Some("physics")),
        ];

        let jobs = plan_followups(&leads, now, Duration::hours(72), &Branding::default());

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].lead_key, "+15551234567");
        assert_eq!(jobs[0].scheduled_for, Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap());
        assert_eq!(
            jobs[0].message_content,
            "Still need help with calculus? AI-TORIUM offers free trials: ai-torium.com/trial"
        );
        assert_eq!(jobs[1].lead_key, "b@x.test");
        assert!(jobs[1].message_content.contains("your studies"));
    }
}
