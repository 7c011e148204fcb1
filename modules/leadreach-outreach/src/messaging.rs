use tracing::{debug, warn};

use leadreach_common::{Branding, Lead};

use crate::ai::{AiAdapter, AiOutcome};

/// SMS segment length. Longer messages are sent anyway, just logged.
pub const SMS_LIMIT: usize = 160;

/// Deterministic message used whenever the model cannot provide one.
pub fn fallback_message(lead: &Lead, branding: &Branding) -> String {
    let topic = lead.primary_keyword().unwrap_or("your studies");
    format!(
        "Hi! Saw you need help with {topic}. {} gives instant step-by-step explanations 24/7. Try free: {}",
        branding.product_name, branding.product_url
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessagingStats {
    pub generated: usize,
    pub fallbacks: usize,
}

/// Write a message onto every lead. Every lead ends up with a non-empty one.
pub async fn compose_messages(
    ai: &AiAdapter,
    leads: &mut [Lead],
    template: Option<&str>,
) -> MessagingStats {
    let mut stats = MessagingStats::default();

    for lead in leads.iter_mut() {
        let message = match ai.compose_message(lead, template).await {
            Ok(AiOutcome::Parsed(message)) => {
                stats.generated += 1;
                message
            }
            Ok(AiOutcome::ParseError(_)) => {
                debug!(lead_id = %lead.id, "Empty message from model, using fallback");
                stats.fallbacks += 1;
                fallback_message(lead, ai.branding())
            }
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "Message generation failed, using fallback");
                stats.fallbacks += 1;
                fallback_message(lead, ai.branding())
            }
        };

        let length = message.chars().count();
        if length > SMS_LIMIT {
            warn!(lead_id = %lead.id, length, "Outreach message exceeds one SMS segment");
        }
        lead.recommended_outreach_message = message;
    }

    stats
}
