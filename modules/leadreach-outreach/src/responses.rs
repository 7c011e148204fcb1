//! Inbound replies: find the lead, classify the reply, mark the lead as
//! responded and answer interested leads once.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use leadreach_common::{Branding, LeadreachError, OutreachStatus};
use twilio::normalize_phone_number;

use crate::ai::{AiOutcome, InterestLevel, NextAction, ReplyClassification};
use crate::deps::OutreachDeps;

/// Marker older free-text classifications used for an interested lead.
const HIGH_INTEREST_MARKER: &str = "high interest";

pub fn auto_reply_text(branding: &Branding) -> String {
    format!(
        "Great! I'll send you a free trial link. {} can help with instant explanations & step-by-step solutions. Check it out: {}",
        branding.product_name, branding.trial_url
    )
}

/// Whether an inbound reply earns the automatic answer.
///
/// A parsed classification decides by its tier; an unparseable one by the
/// "high interest" marker. A reply containing "yes" always qualifies.
pub fn should_auto_reply(
    classification: Option<&AiOutcome<ReplyClassification>>,
    message: &str,
) -> bool {
    let classified_high = match classification {
        Some(AiOutcome::Parsed(c)) => c.interest_level == InterestLevel::High,
        Some(AiOutcome::ParseError(raw)) => raw.contains(HIGH_INTEREST_MARKER),
        None => false,
    };
    classified_high || message.to_lowercase().contains("yes")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyOutcome {
    /// None when no lead has this phone number.
    pub lead_id: Option<Uuid>,
    pub status: Option<OutreachStatus>,
    pub interest_level: Option<InterestLevel>,
    pub next_action: Option<NextAction>,
    pub auto_reply_sent: bool,
}

impl ReplyOutcome {
    pub fn matched(&self) -> bool {
        self.lead_id.is_some()
    }
}

/// Handle one inbound reply. Only store failures surface as errors; an
/// unknown phone number is a successful no-op.
pub async fn handle_reply(
    deps: &OutreachDeps,
    phone: &str,
    message: &str,
) -> Result<ReplyOutcome, LeadreachError> {
    let normalized = normalize_phone_number(phone).unwrap_or_else(|| phone.trim().to_string());
    let phone = normalized.as_str();
    let lead = deps
        .store
        .find_by_phone(phone)
        .await
        .map_err(LeadreachError::Persistence)?;

    let Some(lead) = lead else {
        info!(phone, "Reply from unknown number, ignoring");
        return Ok(ReplyOutcome::default());
    };

    let classification = match deps.ai().classify_reply(message, &lead).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(lead_id = %lead.id, error = %e, "Reply classification failed");
            None
        }
    };

    let updated = deps
        .store
        .update_status(lead.id, OutreachStatus::Responded)
        .await
        .map_err(LeadreachError::Persistence)?;
    let status = if updated {
        OutreachStatus::Responded
    } else {
        warn!(
            lead_id = %lead.id,
            current = %lead.outreach_status,
            "Lead status is past responded, leaving it unchanged"
        );
        lead.outreach_status
    };

    let parsed = classification.as_ref().and_then(|c| match c {
        AiOutcome::Parsed(c) => Some(c),
        AiOutcome::ParseError(_) => None,
    });
    info!(
        lead_id = %lead.id,
        status = %status,
        interest = ?parsed.map(|c| c.interest_level),
        next_action = ?parsed.map(|c| c.next_action),
        "Reply recorded"
    );

    let mut auto_reply_sent = false;
    if should_auto_reply(classification.as_ref(), message) {
        let reply = auto_reply_text(&deps.settings.branding);
        match deps.channel.send(phone, &reply).await {
            Ok(_) => {
                info!(lead_id = %lead.id, phone, "Auto-reply sent");
                auto_reply_sent = true;
            }
            Err(e) => warn!(lead_id = %lead.id, error = %e, "Auto-reply failed"),
        }
    }

    Ok(ReplyOutcome {
        lead_id: Some(lead.id),
        status: Some(status),
        interest_level: parsed.map(|c| c.interest_level),
        next_action: parsed.map(|c| c.next_action),
        auto_reply_sent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(level: InterestLevel) -> AiOutcome<ReplyClassification> {
        AiOutcome::Parsed(ReplyClassification {
            interest_level: level,
            next_action: NextAction::Nurture,
            suggested_reply: None,
        })
    }

    #[test]
    fn high_tier_replies() {
        assert!(should_auto_reply(Some(&parsed(InterestLevel::High)), "tell me more"));
        assert!(!should_auto_reply(Some(&parsed(InterestLevel::Medium)), "tell me more"));
    }

    #[test]
    fn yes_always_replies() {
        assert!(should_auto_reply(Some(&parsed(InterestLevel::Low)), "YES please"));
        assert!(should_auto_reply(None, "Yes"));
        assert!(should_auto_reply(None, "eyes"));
    }

    #[test]
    fn marker_only_counts_when_unparsed() {
        let prose = AiOutcome::ParseError("The lead shows high interest.".into());
        assert!(should_auto_reply(Some(&prose), "ok"));

        let capitalised = AiOutcome::ParseError("High interest shown".into());
        assert!(!should_auto_reply(Some(&capitalised), "ok"));
    }

    #[test]
    fn no_signal_no_reply() {
        assert!(!should_auto_reply(None, "stop texting me"));
        assert!(!should_auto_reply(Some(&parsed(InterestLevel::Negative)), "no thanks"));
    }

    #[test]
    fn auto_reply_uses_trial_link() {
        assert_eq!(
            auto_reply_text(&Branding::default()),
            "Great! I'll send you a free trial link. AI-TORIUM can help with instant explanations & step-by-step solutions. Check it out: ai-torium.com/trial"
        );
    }
}
