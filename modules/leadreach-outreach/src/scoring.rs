use tracing::{debug, warn};

use leadreach_common::Lead;

use crate::ai::{AiAdapter, AiOutcome};

/// Score used when the model answers without a number.
pub const UNPARSED_SCORE: i64 = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScoringStats {
    pub scored: usize,
    pub defaulted: usize,
    /// Calls that failed outright; these leads keep their heuristic score.
    pub kept_heuristic: usize,
}

/// Replace each lead's heuristic score with the model's, one lead at a time.
pub async fn refine_scores(ai: &AiAdapter, leads: &mut [Lead]) -> ScoringStats {
    let mut stats = ScoringStats::default();

    for lead in leads.iter_mut() {
        match ai.score_lead(lead).await {
            Ok(AiOutcome::Parsed(score)) => {
                debug!(lead_id = %lead.id, heuristic = lead.lead_score(), score, "Lead scored");
                lead.set_lead_score(score as i64);
                stats.scored += 1;
            }
            Ok(AiOutcome::ParseError(raw)) => {
                debug!(lead_id = %lead.id, response = raw.as_str(), "No score in response, using default");
                lead.set_lead_score(UNPARSED_SCORE);
                stats.defaulted += 1;
            }
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "Scoring call failed, keeping heuristic score");
                stats.kept_heuristic += 1;
            }
        }
    }

    stats
}

/// Highest scores first, ties in extraction order, at most `max_leads`.
pub fn select_top(mut leads: Vec<Lead>, max_leads: usize) -> Vec<Lead> {
    leads.sort_by(|a, b| b.lead_score().cmp(&a.lead_score()));
    leads.truncate(max_leads);
    leads
}
