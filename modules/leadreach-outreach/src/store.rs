//! Postgres-backed `LeadStore`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use leadreach_common::{Lead, LeadSource, OutreachStatus};

use crate::traits::LeadStore;

/// Rows per INSERT statement, keeping bind parameters well under Postgres' limit.
const INSERT_CHUNK: usize = 1_000;

const LEAD_COLUMNS: &str = "id, campaign_id, email, phone, full_name, source, source_url, \
    scraped_content, interest_keywords, lead_score, predicted_conversion_probability, \
    recommended_outreach_message, outreach_status, contact_attempts, last_contacted_at, created_at";

#[derive(Debug, Clone, sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    campaign_id: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    full_name: Option<String>,
    source: String,
    source_url: String,
    scraped_content: String,
    interest_keywords: Vec<String>,
    lead_score: i16,
    predicted_conversion_probability: f64,
    recommended_outreach_message: String,
    outreach_status: String,
    contact_attempts: i32,
    last_contacted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = anyhow::Error;

    fn try_from(row: LeadRow) -> Result<Self> {
        let source: LeadSource = row.source.parse().map_err(|e: String| anyhow!(e))?;
        let status: OutreachStatus = row.outreach_status.parse().map_err(|e: String| anyhow!(e))?;

        let mut lead = Lead::new(source, row.source_url, row.scraped_content);
        lead.id = row.id;
        lead.campaign_id = row.campaign_id;
        lead.email = row.email;
        lead.phone = row.phone;
        lead.full_name = row.full_name;
        lead.interest_keywords = row.interest_keywords;
        lead.set_lead_score(row.lead_score as i64);
        lead.set_predicted_conversion_probability(row.predicted_conversion_probability);
        lead.recommended_outreach_message = row.recommended_outreach_message;
        lead.outreach_status = status;
        lead.contact_attempts = row.contact_attempts.max(0) as u32;
        lead.last_contacted_at = row.last_contacted_at;
        lead.created_at = row.created_at;
        Ok(lead)
    }
}

/// Statuses a lead may be in for a move to `next` to be allowed.
fn predecessors(next: OutreachStatus) -> Vec<String> {
    [
        OutreachStatus::New,
        OutreachStatus::Contacted,
        OutreachStatus::Responded,
        OutreachStatus::Converted,
        OutreachStatus::Stopped,
    ]
    .into_iter()
    .filter(|s| *s == next || s.can_transition_to(next))
    .map(|s| s.as_str().to_string())
    .collect()
}

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn insert_leads(&self, leads: &[Lead]) -> Result<()> {
        if leads.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        for chunk in leads.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO leads ({LEAD_COLUMNS}) "));
            builder.push_values(chunk, |mut b, lead| {
                b.push_bind(lead.id)
                    .push_bind(lead.campaign_id.clone())
                    .push_bind(lead.email.clone())
                    .push_bind(lead.phone.clone())
                    .push_bind(lead.full_name.clone())
                    .push_bind(lead.source.as_str())
                    .push_bind(lead.source_url.clone())
                    .push_bind(lead.scraped_content.clone())
                    .push_bind(lead.interest_keywords.clone())
                    .push_bind(lead.lead_score() as i16)
                    .push_bind(lead.predicted_conversion_probability())
                    .push_bind(lead.recommended_outreach_message.clone())
                    .push_bind(lead.outreach_status.as_str())
                    .push_bind(lead.contact_attempts as i32)
                    .push_bind(lead.last_contacted_at)
                    .push_bind(lead.created_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("Failed to insert leads")?;
        }
        tx.commit().await.context("Failed to commit lead insert")?;

        Ok(())
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE phone = $1
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up lead by phone")?;

        row.map(Lead::try_from).transpose()
    }

    async fn record_contact(
        &self,
        lead_id: Uuid,
        contacted_at: DateTime<Utc>,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE leads
             SET outreach_status = CASE WHEN outreach_status = 'new' THEN 'contacted' ELSE outreach_status END,
                 contact_attempts = contact_attempts + 1,
                 last_contacted_at = $2,
                 recommended_outreach_message = $3,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(lead_id)
        .bind(contacted_at)
        .bind(message)
        .execute(&self.pool)
        .await
        .context("Failed to record contact")?;

        Ok(())
    }

    async fn update_status(&self, lead_id: Uuid, status: OutreachStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE leads
             SET outreach_status = $2, updated_at = now()
             WHERE id = $1 AND outreach_status = ANY($3)",
        )
        .bind(lead_id)
        .bind(status.as_str())
        .bind(predecessors(status))
        .execute(&self.pool)
        .await
        .context("Failed to update lead status")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responded_reachable_from_earlier_states_only() {
        assert_eq!(predecessors(OutreachStatus::Responded), vec!["new", "contacted", "responded"]);
    }

    #[test]
    fn stopped_reachable_from_all_but_itself_is_idempotent() {
        assert_eq!(
            predecessors(OutreachStatus::Stopped),
            vec!["new", "contacted", "responded", "converted", "stopped"]
        );
    }

    #[test]
    fn row_converts_to_lead() {
        let row = LeadRow {
            id: Uuid::new_v4(),
            campaign_id: Some("campaign_1".into()),
            email: None,
            phone: Some("+15551234567".into()),
            full_name: None,
            source: "forum_scrape".into(),
            source_url: "https://forum.test/1".into(),
            scraped_content: "help".into(),
            interest_keywords: vec!["algebra".into()],
            lead_score: 82,
            predicted_conversion_probability: 0.4,
            recommended_outreach_message: "Hi".into(),
            outreach_status: "contacted".into(),
            contact_attempts: 1,
            last_contacted_at: None,
            created_at: Utc::now(),
        };
        let id = row.id;
        let lead = Lead::try_from(row).unwrap();
        assert_eq!(lead.id, id);
        assert_eq!(lead.source, LeadSource::ForumScrape);
        assert_eq!(lead.outreach_status, OutreachStatus::Contacted);
        assert_eq!(lead.lead_score(), 82);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let row = LeadRow {
            id: Uuid::new_v4(),
            campaign_id: None,
            email: None,
            phone: None,
            full_name: None,
            source: "organic".into(),
            source_url: String::new(),
            scraped_content: String::new(),
            interest_keywords: Vec::new(),
            lead_score: 0,
            predicted_conversion_probability: 0.0,
            recommended_outreach_message: String::new(),
            outreach_status: "archived".into(),
            contact_attempts: 0,
            last_contacted_at: None,
            created_at: Utc::now(),
        };
        assert!(Lead::try_from(row).is_err());
    }
}
