//! Turns scraped content into leads: batched model extraction, then a local
//! heuristic score and conversion probability per candidate.

use tracing::{info, warn};

use leadreach_common::{Lead, LeadSource, RawContentItem, MAX_CONVERSION_PROBABILITY};
use twilio::normalize_phone_number;

use crate::ai::{AiAdapter, AiOutcome, ExtractedLead};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Subjects that earn a keyword bonus when any interest keyword contains one.
pub const HIGH_VALUE_SUBJECTS: [&str; 4] = ["math", "physics", "chemistry", "calculus"];

const BASE_SCORE: i64 = 50;
const BASE_PROBABILITY: f64 = 0.15;

/// Qualitative tier as the model writes it. Anything unrecognised counts as
/// no tier at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn parse(label: Option<&str>) -> Option<Tier> {
        match label?.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Tier::High),
            "medium" => Some(Tier::Medium),
            "low" => Some(Tier::Low),
            _ => None,
        }
    }
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn urgency(candidate: &ExtractedLead) -> Option<Tier> {
    Tier::parse(
        candidate
            .needs_assessment
            .as_ref()
            .and_then(|n| n.urgency.as_deref()),
    )
}

fn quality(candidate: &ExtractedLead) -> Option<Tier> {
    Tier::parse(candidate.lead_quality.as_deref())
}

/// Base 50, plus bonuses for quality, urgency, contact details and
/// high-value subjects. Clamping happens when the score is stored.
pub fn heuristic_score(candidate: &ExtractedLead) -> i64 {
    let mut score = BASE_SCORE;

    score += match quality(candidate) {
        Some(Tier::High) => 30,
        Some(Tier::Medium) => 15,
        _ => 0,
    };
    score += match urgency(candidate) {
        Some(Tier::High) => 20,
        Some(Tier::Medium) => 10,
        _ => 0,
    };
    if present(&candidate.email) {
        score += 15;
    }
    if present(&candidate.phone) {
        score += 10;
    }

    let high_value = candidate.interest_keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        HIGH_VALUE_SUBJECTS.iter().any(|s| keyword.contains(s))
    });
    if high_value {
        score += 15;
    }

    score
}

pub fn conversion_probability(candidate: &ExtractedLead) -> f64 {
    let mut multiplier = 1.0;
    if urgency(candidate) == Some(Tier::High) {
        multiplier += 0.5;
    }
    if present(&candidate.email) || present(&candidate.phone) {
        multiplier += 0.3;
    }
    if quality(candidate) == Some(Tier::High) {
        multiplier += 0.4;
    }
    (BASE_PROBABILITY * multiplier).min(MAX_CONVERSION_PROBABILITY)
}

/// Build a lead from a candidate. Source and missing content come from the
/// raw item with the same URL when there is one.
pub fn build_lead(mut candidate: ExtractedLead, batch: &[RawContentItem]) -> Lead {
    // A phone that cannot be written as E.164 is not a reachable contact.
    candidate.phone = candidate.phone.as_deref().and_then(normalize_phone_number);

    let origin = batch.iter().find(|item| item.url == candidate.source_url);

    let source = match origin {
        Some(item) => LeadSource::from_platform(item.platform),
        None => LeadSource::from_url(&candidate.source_url),
    };
    let content = candidate
        .scraped_content
        .clone()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| origin.map(|item| item.content.clone()))
        .unwrap_or_default();

    let mut lead = Lead::new(source, candidate.source_url.clone(), content);
    lead.set_lead_score(heuristic_score(&candidate));
    lead.set_predicted_conversion_probability(conversion_probability(&candidate));
    lead.email = candidate.email.filter(|v| !v.trim().is_empty());
    lead.phone = candidate.phone;
    lead.full_name = candidate.full_name.filter(|v| !v.trim().is_empty());
    lead.set_interest_keywords(candidate.interest_keywords);
    lead
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub leads: Vec<Lead>,
    pub batches: usize,
    pub batches_dropped: usize,
}

/// Extract leads batch by batch. A batch whose call fails or whose answer
/// does not parse is dropped; extraction itself never fails.
pub async fn extract_leads(
    ai: &AiAdapter,
    items: &[RawContentItem],
    batch_size: usize,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for (index, batch) in items.chunks(batch_size.max(1)).enumerate() {
        report.batches += 1;
        match ai.extract_leads(batch).await {
            Ok(AiOutcome::Parsed(candidates)) => {
                info!(batch = index, items = batch.len(), candidates = candidates.len(), "Batch extracted");
                report
                    .leads
                    .extend(candidates.into_iter().map(|c| build_lead(c, batch)));
            }
            Ok(AiOutcome::ParseError(raw)) => {
                warn!(
                    batch = index,
                    response = ai_client::truncate_to_char_boundary(&raw, 200),
                    "No lead array in extraction response, dropping batch"
                );
                report.batches_dropped += 1;
            }
            Err(e) => {
                warn!(batch = index, error = %e, "Extraction call failed, dropping batch");
                report.batches_dropped += 1;
            }
        }
    }

    report
}
