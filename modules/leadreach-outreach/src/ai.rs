//! Adapter over the model for the four calls the pipeline makes.
//!
//! Each call returns `Ok(AiOutcome::Parsed(..))` when the model text could be
//! turned into the expected shape, `Ok(AiOutcome::ParseError(raw))` when it
//! could not, and `Err(AiError)` when the call itself failed. Callers decide
//! what each of those means for their stage.

use std::sync::Arc;

use ai_client::{
    first_integer, first_json_array, first_json_object, strip_code_blocks,
    truncate_to_char_boundary, AiError, CompletionRequest, TextAgent,
};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use leadreach_common::{Branding, Lead, RawContentItem, MAX_LEAD_SCORE};

use crate::retry::{RetryPolicies, RetryPolicy};

/// Longest slice of scraped content forwarded in a single-lead prompt.
const MAX_CONTEXT_BYTES: usize = 2_000;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum AiOutcome<T> {
    Parsed(T),
    /// The model answered but the answer did not have the expected shape.
    ParseError(String),
}

impl<T> AiOutcome<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            AiOutcome::Parsed(value) => Some(value),
            AiOutcome::ParseError(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, AiOutcome::Parsed(_))
    }
}

// ---------------------------------------------------------------------------
// Extraction response
// ---------------------------------------------------------------------------

/// One candidate lead as the model describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLead {
    /// URL of the post the lead was found in
    #[serde(default, deserialize_with = "nullable")]
    pub source_url: String,
    /// The original post text
    pub scraped_content: Option<String>,
    /// Author's real name, if stated
    #[serde(default, deserialize_with = "lenient_text")]
    pub full_name: Option<String>,
    /// Email address, only if it appears in the content
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    /// Phone number, only if it appears in the content
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    /// Academic subjects and topics the person needs help with
    #[serde(default, deserialize_with = "nullable")]
    pub interest_keywords: Vec<String>,
    pub needs_assessment: Option<NeedsAssessment>,
    /// "high", "medium" or "low"
    pub lead_quality: Option<String>,
    /// Why this person would want AI tutoring
    pub reason_for_interest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NeedsAssessment {
    #[serde(default, deserialize_with = "nullable")]
    pub subjects: Vec<String>,
    /// "high", "medium" or "low"
    pub urgency: Option<String>,
    /// "high school", "college" or "graduate"
    pub education_level: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub specific_topics: Vec<String>,
}

/// Models send `null` for fields they have nothing for.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Contact fields sometimes come back as bare numbers (`"phone": 5551234567`).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Classification response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    High,
    Medium,
    Low,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ScheduleDemo,
    SendInfo,
    Nurture,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReplyClassification {
    pub interest_level: InterestLevel,
    pub next_action: NextAction,
    /// A short reply the sender could be sent next
    #[serde(default)]
    pub suggested_reply: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Candidates are decoded one by one so a single malformed entry only costs
/// that entry. An array with entries but no usable candidate is a parse error.
pub fn parse_extraction(raw: &str) -> AiOutcome<Vec<ExtractedLead>> {
    let Some(array) = first_json_array(raw) else {
        return AiOutcome::ParseError(raw.to_string());
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(array) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(error = %e, "Extraction array is not valid JSON");
            return AiOutcome::ParseError(raw.to_string());
        }
    };

    let total = entries.len();
    let leads: Vec<ExtractedLead> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(lead) => Some(lead),
            Err(e) => {
                debug!(index, error = %e, "Skipping candidate that does not match the lead shape");
                None
            }
        })
        .collect();

    if total > 0 && leads.is_empty() {
        return AiOutcome::ParseError(raw.to_string());
    }
    AiOutcome::Parsed(leads)
}

/// First integer in the text, clamped to the score range.
pub fn parse_score(raw: &str) -> AiOutcome<u8> {
    match first_integer(raw) {
        Some(n) => AiOutcome::Parsed(n.min(MAX_LEAD_SCORE as u64) as u8),
        None => AiOutcome::ParseError(raw.to_string()),
    }
}

pub fn parse_message(raw: &str) -> AiOutcome<String> {
    let text = raw.trim().trim_matches('"').trim();
    if text.is_empty() {
        AiOutcome::ParseError(raw.to_string())
    } else {
        AiOutcome::Parsed(text.to_string())
    }
}

pub fn parse_classification(raw: &str) -> AiOutcome<ReplyClassification> {
    first_json_object(strip_code_blocks(raw))
        .and_then(|object| serde_json::from_str(object).ok())
        .map_or_else(|| AiOutcome::ParseError(raw.to_string()), AiOutcome::Parsed)
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AiAdapter {
    agent: Arc<dyn TextAgent>,
    retries: RetryPolicies,
    branding: Branding,
}

impl AiAdapter {
    pub fn new(agent: Arc<dyn TextAgent>, retries: RetryPolicies, branding: Branding) -> Self {
        Self {
            agent,
            retries,
            branding,
        }
    }

    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    pub async fn extract_leads(
        &self,
        batch: &[RawContentItem],
    ) -> Result<AiOutcome<Vec<ExtractedLead>>, AiError> {
        let request = CompletionRequest::new("lead_extraction", extraction_prompt(batch, &self.branding))
            .system(extraction_system_prompt())
            .max_tokens(4000);
        let raw = self.complete(request, &self.retries.extraction).await?;
        Ok(parse_extraction(&raw))
    }

    pub async fn score_lead(&self, lead: &Lead) -> Result<AiOutcome<u8>, AiError> {
        let request = CompletionRequest::new("lead_scoring", scoring_prompt(lead)).max_tokens(100);
        let raw = self.complete(request, &self.retries.scoring).await?;
        Ok(parse_score(&raw))
    }

    pub async fn compose_message(
        &self,
        lead: &Lead,
        template: Option<&str>,
    ) -> Result<AiOutcome<String>, AiError> {
        let request = CompletionRequest::new(
            "outreach_message",
            message_prompt(lead, template, &self.branding),
        )
        .max_tokens(200);
        let raw = self.complete(request, &self.retries.messaging).await?;
        Ok(parse_message(&raw))
    }

    pub async fn classify_reply(
        &self,
        message: &str,
        lead: &Lead,
    ) -> Result<AiOutcome<ReplyClassification>, AiError> {
        let request = CompletionRequest::new("reply_classification", classification_prompt(message, lead))
            .max_tokens(500);
        let raw = self.complete(request, &self.retries.classification).await?;
        Ok(parse_classification(&raw))
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        policy: &RetryPolicy,
    ) -> Result<String, AiError> {
        let purpose = request.purpose;
        policy
            .run(purpose, AiError::is_transient, || self.agent.complete(request.clone()))
            .await
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn extraction_system_prompt() -> String {
    let schema = schemars::schema_for!(ExtractedLead);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "You are an expert lead generation analyst. You read scraped posts and \
         identify students who need help with their studies.\n\n\
         Respond with a JSON array. Each element must match this schema:\n{schema}\n\n\
         Only include people showing genuine academic need. Skip promotional \
         content, spam and non-educational posts. Never invent contact details: \
         leave email and phone null unless they appear in the content. If no \
         post qualifies, respond with []."
    )
}

fn extraction_prompt(batch: &[RawContentItem], branding: &Branding) -> String {
    let items: Vec<String> = batch
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{}. URL: {}\nTitle: {}\nContent: {}\nAuthor: {}\n---",
                i + 1,
                item.url,
                item.title,
                item.content,
                item.author.as_deref().unwrap_or("Unknown"),
            )
        })
        .collect();

    format!(
        "Extract potential leads for an AI tutoring platform called {product}.\n\n\
         SCRAPED CONTENT:\n{items}\n\n\
         For each piece of content, determine:\n\
         1. Is this person likely a student who needs tutoring help?\n\
         2. What subject areas are they struggling with?\n\
         3. What is their apparent education level?\n\
         4. How urgent is their need?\n\
         5. Is any contact information present?",
        product = branding.product_name,
        items = items.join("\n"),
    )
}

fn scoring_prompt(lead: &Lead) -> String {
    let has_contact = if lead.has_email() || lead.has_phone() { "Yes" } else { "No" };
    format!(
        "Analyze this lead for an AI tutoring platform and provide a score from 0-100:\n\n\
         LEAD DATA:\n\
         - Source: {source}\n\
         - Content: {content}\n\
         - Keywords: {keywords}\n\
         - Has contact info: {has_contact}\n\n\
         Consider:\n\
         1. Academic need urgency\n\
         2. Likelihood to pay for tutoring\n\
         3. Match with our AI tutoring services\n\
         4. Quality of contact information\n\n\
         Respond with just a number from 0-100.",
        source = lead.source,
        content = truncate_to_char_boundary(&lead.scraped_content, MAX_CONTEXT_BYTES),
        keywords = lead.interest_keywords.join(", "),
    )
}

fn message_prompt(lead: &Lead, template: Option<&str>, branding: &Branding) -> String {
    let template = template
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("\nBASE TEMPLATE: {t}\n"))
        .unwrap_or_default();
    format!(
        "Create a personalized outreach message for this lead interested in AI tutoring:\n\n\
         LEAD CONTEXT:\n\
         - Source: {source}\n\
         - Interest areas: {keywords}\n\
         - Original content: {content}\n\
         - Lead score: {score}/100\n\n\
         PRODUCT: {product} ({url}), an AI tutoring platform with instant explanations, \
         step-by-step problem solving, photo uploads and 24/7 availability.\n\n\
         REQUIREMENTS:\n\
         - Keep the message under 160 characters for SMS\n\
         - Be helpful, not pushy\n\
         - Reference their specific academic need\n\
         - Include a clear call-to-action\n\
         {template}\n\
         Reply with the SMS text only.",
        source = lead.source,
        keywords = lead.interest_keywords.join(", "),
        content = truncate_to_char_boundary(&lead.scraped_content, MAX_CONTEXT_BYTES),
        score = lead.lead_score(),
        product = branding.product_name,
        url = branding.product_url,
    )
}

fn classification_prompt(message: &str, lead: &Lead) -> String {
    format!(
        "A lead responded to our AI tutoring outreach with: \"{message}\"\n\n\
         Original lead context: {content}\n\
         Interest areas: {keywords}\n\n\
         Classify the response. Reply with a single JSON object and nothing else:\n\
         {{\"interest_level\": \"high\" | \"medium\" | \"low\" | \"negative\", \
         \"next_action\": \"schedule_demo\" | \"send_info\" | \"nurture\" | \"stop\", \
         \"suggested_reply\": \"<short follow-up message>\"}}",
        content = truncate_to_char_boundary(&lead.scraped_content, MAX_CONTEXT_BYTES),
        keywords = lead.interest_keywords.join(", "),
    )
}
