//! One campaign run, from scraping to follow-up scheduling.
//!
//! Stages run strictly in order. Each stage absorbs its own failures except
//! persistence: if the selected leads cannot be stored the run stops there
//! and nothing is generated or sent.

use std::fmt;

use chrono::Utc;
use tracing::{error, info};

use leadreach_common::{CampaignConfig, CampaignId, CampaignResult, LeadreachError};

use crate::deps::OutreachDeps;
use crate::extraction::extract_leads;
use crate::followup::schedule_followups;
use crate::messaging::compose_messages;
use crate::scoring::{refine_scores, select_top};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStage {
    Scraping,
    Extracting,
    Scoring,
    Persisting,
    Messaging,
    Dispatching,
    Scheduling,
    Completed,
    Failed,
}

impl fmt::Display for CampaignStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CampaignStage::Scraping => "scraping",
            CampaignStage::Extracting => "extracting",
            CampaignStage::Scoring => "scoring",
            CampaignStage::Persisting => "persisting",
            CampaignStage::Messaging => "messaging",
            CampaignStage::Dispatching => "dispatching",
            CampaignStage::Scheduling => "scheduling",
            CampaignStage::Completed => "completed",
            CampaignStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(campaign_id: &CampaignId, stage: CampaignStage) {
    info!(campaign_id = %campaign_id, stage = %stage, "Campaign stage");
}

pub async fn run_campaign(
    deps: &OutreachDeps,
    config: &CampaignConfig,
) -> Result<CampaignResult, LeadreachError> {
    config.validate().map_err(LeadreachError::Validation)?;

    let campaign_id = CampaignId::generate();
    let started_at = Utc::now();
    let settings = &deps.settings;
    let ai = deps.ai();

    info!(
        campaign_id = %campaign_id,
        targets = config.targets.len(),
        max_leads = config.max_leads,
        method = ?config.outreach_method,
        "Starting outreach campaign"
    );

    enter(&campaign_id, CampaignStage::Scraping);
    let scraped = deps.scrapers.scrape_all(&config.targets).await;
    let leads_processed = scraped.items.len();

    enter(&campaign_id, CampaignStage::Extracting);
    let extraction = extract_leads(&ai, &scraped.items, settings.batch_size).await;
    let leads_identified = extraction.leads.len();
    info!(
        campaign_id = %campaign_id,
        items = leads_processed,
        leads = leads_identified,
        batches_dropped = extraction.batches_dropped,
        "Extraction complete"
    );

    enter(&campaign_id, CampaignStage::Scoring);
    let mut leads = extraction.leads;
    let scoring = refine_scores(&ai, &mut leads).await;
    let mut selected = select_top(leads, config.max_leads);
    for lead in selected.iter_mut() {
        lead.campaign_id = Some(campaign_id.to_string());
    }
    info!(
        campaign_id = %campaign_id,
        selected = selected.len(),
        scored = scoring.scored,
        defaulted = scoring.defaulted,
        kept_heuristic = scoring.kept_heuristic,
        "Leads selected"
    );

    enter(&campaign_id, CampaignStage::Persisting);
    let stored = settings
        .retries
        .store_write
        .run("insert_leads", |_: &anyhow::Error| true, || {
            deps.store.insert_leads(&selected)
        })
        .await;
    if let Err(e) = stored {
        enter(&campaign_id, CampaignStage::Failed);
        error!(campaign_id = %campaign_id, error = %e, "Failed to persist leads, aborting campaign");
        return Err(LeadreachError::Persistence(e));
    }

    enter(&campaign_id, CampaignStage::Messaging);
    let messaging = compose_messages(&ai, &mut selected, config.message_template.as_deref()).await;
    info!(
        campaign_id = %campaign_id,
        generated = messaging.generated,
        fallbacks = messaging.fallbacks,
        "Messages composed"
    );

    enter(&campaign_id, CampaignStage::Dispatching);
    let dispatch = if config.outreach_method.dispatches() {
        deps.dispatcher().dispatch(&mut selected).await
    } else {
        info!(campaign_id = %campaign_id, "Outreach method does not send, skipping dispatch");
        Default::default()
    };

    enter(&campaign_id, CampaignStage::Scheduling);
    let followups = schedule_followups(
        deps.followups.as_ref(),
        &selected,
        settings.followup_delay,
        &settings.branding,
    )
    .await;

    enter(&campaign_id, CampaignStage::Completed);
    let result = CampaignResult {
        campaign_id,
        leads_processed,
        leads_identified,
        leads_selected: selected.len(),
        leads_contacted: dispatch.attempted,
        leads_delivered: dispatch.delivered,
        followups_scheduled: followups.len(),
        started_at,
        completed_at: Utc::now(),
    };
    info!("{result}");

    Ok(result)
}
