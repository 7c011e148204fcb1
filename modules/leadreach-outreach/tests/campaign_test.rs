//! End-to-end campaign runs against in-memory collaborators.
//!
//! No network, no database, no model: every boundary is a mock from
//! `leadreach_outreach::testing`.

use std::sync::Arc;

use leadreach_common::{
    CampaignConfig, LeadSource, LeadreachError, OutreachMethod, OutreachStatus, Platform,
    ScrapingTarget, MAX_CONVERSION_PROBABILITY,
};
use leadreach_outreach::extraction::DEFAULT_BATCH_SIZE;
use leadreach_outreach::messaging::fallback_message;
use leadreach_outreach::run_campaign;
use leadreach_outreach::testing::{
    raw_item, test_deps, FailingScraper, MemoryLeadStore, RecordingChannel, RecordingFollowupSink,
    ScriptedAgent, StaticScraper,
};
use leadreach_outreach::traits::ContentScraper;

const FAILING: &str = "https://reddit.com/r/Broken";
const WORKING: &str = "https://reddit.com/r/learnmath";

const POST_1: &str = "https://www.reddit.com/r/learnmath/comments/1";
const POST_2: &str = "https://www.reddit.com/r/learnmath/comments/2";
const POST_3: &str = "https://www.reddit.com/r/learnmath/comments/3";

const EXTRACTION: &str = r#"Here is what I found:
[
  {"sourceUrl": "https://www.reddit.com/r/learnmath/comments/1", "phone": "+15550000001",
   "interestKeywords": ["algebra"], "leadQuality": "low"},
  {"sourceUrl": "https://www.reddit.com/r/learnmath/comments/2", "email": null,
   "interestKeywords": ["calculus"], "needsAssessment": {"urgency": "high"}, "leadQuality": "high"},
  {"sourceUrl": "https://www.reddit.com/r/learnmath/comments/3", "phone": "+15550000003",
   "interestKeywords": ["physics"], "leadQuality": "medium"}
]"#;

struct Harness {
    agent: Arc<ScriptedAgent>,
    store: Arc<MemoryLeadStore>,
    channel: Arc<RecordingChannel>,
    followups: Arc<RecordingFollowupSink>,
}

impl Harness {
    fn new(agent: ScriptedAgent, store: MemoryLeadStore) -> Self {
        Self {
            agent: Arc::new(agent),
            store: Arc::new(store),
            channel: Arc::new(RecordingChannel::new()),
            followups: Arc::new(RecordingFollowupSink::new()),
        }
    }

    fn deps(&self, scraper: Arc<dyn ContentScraper>) -> leadreach_outreach::OutreachDeps {
        test_deps(
            self.agent.clone(),
            self.store.clone(),
            self.channel.clone(),
            scraper,
            self.followups.clone(),
        )
    }
}

fn scraper() -> Arc<dyn ContentScraper> {
    Arc::new(
        StaticScraper::new().failing(FAILING).on_target(
            WORKING,
            vec![
                raw_item(POST_1, "How do I factor x^2 + 5x + 6?"),
                raw_item(POST_2, "Calc exam tomorrow and I don't understand limits"),
                raw_item(POST_3, "Why does a heavier ball fall at the same speed?"),
            ],
        ),
    )
}

fn config(max_leads: usize, method: OutreachMethod) -> CampaignConfig {
    CampaignConfig {
        targets: vec![
            ScrapingTarget::new(Platform::SocialForum, FAILING, &["help"]),
            ScrapingTarget::new(Platform::SocialForum, WORKING, &["help"]),
        ],
        max_leads,
        outreach_method: method,
        message_template: None,
    }
}

fn scripted_campaign() -> ScriptedAgent {
    ScriptedAgent::new()
        .respond("lead_extraction", EXTRACTION)
        .respond_once("lead_scoring", "70")
        .respond_once("lead_scoring", "Score: 90")
        .respond_once("lead_scoring", "80")
        .respond("outreach_message", "Hi! Stuck on this? Try AI-TORIUM free: ai-torium.com")
}

#[tokio::test]
async fn failing_target_does_not_reduce_other_leads() {
    let h = Harness::new(scripted_campaign(), MemoryLeadStore::new());

    let result = run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::Both))
        .await
        .unwrap();

    assert_eq!(result.leads_processed, 3);
    assert_eq!(result.leads_identified, 3);
    let prompts = h.agent.prompts("lead_extraction");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(POST_1) && prompts[0].contains(POST_3));
    assert!(!prompts[0].contains(FAILING));
}

#[tokio::test]
async fn selects_top_leads_and_contacts_only_those_with_phones() {
    let h = Harness::new(scripted_campaign(), MemoryLeadStore::new());

    let result = run_campaign(&h.deps(scraper()), &config(2, OutreachMethod::Both))
        .await
        .unwrap();

    // Scores 70, 90, 80 -> POST_2 (no phone) and POST_3 are selected.
    let stored = h.store.leads();
    let urls: Vec<_> = stored.iter().map(|l| l.source_url.as_str()).collect();
    assert_eq!(urls, vec![POST_2, POST_3]);
    assert!(stored
        .iter()
        .all(|l| l.campaign_id.as_deref() == Some(result.campaign_id.as_str())));
    assert!(stored.iter().all(|l| l.source == LeadSource::SocialForumScrape));

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].phone, "+15550000003");
    assert_eq!(sent[0].message, "Hi! Stuck on this? Try AI-TORIUM free: ai-torium.com");

    assert_eq!(result.leads_selected, 2);
    assert_eq!(result.leads_contacted, 1);
    assert_eq!(result.leads_delivered, 1);

    let contacted = stored.iter().find(|l| l.source_url == POST_3).unwrap();
    let contacted = h.store.get(contacted.id).unwrap();
    assert_eq!(contacted.outreach_status, OutreachStatus::Contacted);
    assert_eq!(contacted.contact_attempts, 1);
    assert!(contacted.last_contacted_at.is_some());

    // POST_2 has neither phone nor email, so only POST_3 gets a follow-up.
    let jobs = h.followups.jobs();
    assert_eq!(result.followups_scheduled, 1);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].lead_key, "+15550000003");
    assert!(jobs[0].message_content.contains("physics"));
    assert!(jobs[0].scheduled_for > result.started_at + chrono::Duration::hours(71));
}

#[tokio::test]
async fn persistence_failure_aborts_before_messaging() {
    let h = Harness::new(scripted_campaign(), MemoryLeadStore::new().failing_inserts());

    let err = run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::Both))
        .await
        .unwrap_err();

    assert!(matches!(err, LeadreachError::Persistence(_)));
    assert_eq!(h.agent.calls("outreach_message"), 0);
    assert!(h.channel.sent().is_empty());
    assert!(h.followups.jobs().is_empty());
}

#[tokio::test]
async fn scores_and_probabilities_stay_in_bounds() {
    let agent = ScriptedAgent::new()
        .respond("lead_extraction", EXTRACTION)
        .respond_once("lead_scoring", "1000")
        .respond_once("lead_scoring", "-40")
        .respond_once("lead_scoring", "no idea")
        .respond("outreach_message", "Hi");
    let h = Harness::new(agent, MemoryLeadStore::new());

    run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::MessageOnly))
        .await
        .unwrap();

    let stored = h.store.leads();
    assert_eq!(stored.len(), 3);
    for lead in &stored {
        assert!(lead.lead_score() <= 100);
        let p = lead.predicted_conversion_probability();
        assert!((0.0..=MAX_CONVERSION_PROBABILITY).contains(&p));
    }
    let scores: Vec<_> = stored.iter().map(|l| l.lead_score()).collect();
    // 1000 clamps to 100, "-40" reads as 40, unparseable defaults to 50.
    assert_eq!(scores, vec![100, 50, 40]);
}

#[tokio::test]
async fn scoring_failure_keeps_heuristic_score() {
    let agent = ScriptedAgent::new()
        .respond("lead_extraction", EXTRACTION)
        .fail("lead_scoring")
        .respond("outreach_message", "Hi");
    let h = Harness::new(agent, MemoryLeadStore::new());

    run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::MessageOnly))
        .await
        .unwrap();

    let stored = h.store.leads();
    let by_url = |url: &str| stored.iter().find(|l| l.source_url == url).unwrap().lead_score();
    // high quality + high urgency + calculus
    assert_eq!(by_url(POST_2), 100);
    // medium quality + phone + physics
    assert_eq!(by_url(POST_3), 50 + 15 + 10 + 15);
    // low quality + phone
    assert_eq!(by_url(POST_1), 50 + 10);
}

#[tokio::test]
async fn message_failure_falls_back_to_template() {
    let agent = ScriptedAgent::new()
        .respond("lead_extraction", EXTRACTION)
        .respond("lead_scoring", "60")
        .fail("outreach_message");
    let h = Harness::new(agent, MemoryLeadStore::new());

    run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::DispatchOnly))
        .await
        .unwrap();

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 2);
    let stored = h.store.leads();
    for message in &sent {
        let lead = stored
            .iter()
            .find(|l| l.phone.as_deref() == Some(message.phone.as_str()))
            .unwrap();
        assert_eq!(message.message, fallback_message(lead, &Default::default()));
        assert!(!message.message.is_empty());
    }
}

#[tokio::test]
async fn message_only_campaign_sends_nothing() {
    let h = Harness::new(scripted_campaign(), MemoryLeadStore::new());

    let result = run_campaign(&h.deps(scraper()), &config(10, OutreachMethod::MessageOnly))
        .await
        .unwrap();

    assert!(h.channel.sent().is_empty());
    assert_eq!(result.leads_contacted, 0);
    assert_eq!(h.agent.calls("outreach_message"), 3);
    assert!(h
        .store
        .leads()
        .iter()
        .all(|l| l.outreach_status == OutreachStatus::New));
}

#[tokio::test]
async fn unparseable_batch_is_skipped() {
    let agent = ScriptedAgent::new()
        .respond_once("lead_extraction", "Sorry, none of these look like students.")
        .respond_once(
            "lead_extraction",
            r#"[{"sourceUrl": "https://www.reddit.com/r/learnmath/comments/3", "phone": "+15550000003"}]"#,
        )
        .respond("lead_scoring", "75")
        .respond("outreach_message", "Hi");
    let h = Harness::new(agent, MemoryLeadStore::new());
    let mut deps = h.deps(scraper());
    deps.settings.batch_size = 2;

    let result = run_campaign(&deps, &config(10, OutreachMethod::Both)).await.unwrap();

    assert_eq!(h.agent.calls("lead_extraction"), 2);
    assert_eq!(result.leads_processed, 3);
    assert_eq!(result.leads_identified, 1);
    assert_eq!(result.leads_contacted, 1);
}

#[tokio::test]
async fn every_target_failing_still_completes() {
    let h = Harness::new(ScriptedAgent::new(), MemoryLeadStore::new());

    let result = run_campaign(&h.deps(Arc::new(FailingScraper)), &config(10, OutreachMethod::Both))
        .await
        .unwrap();

    assert_eq!(result.leads_processed, 0);
    assert_eq!(result.leads_identified, 0);
    assert_eq!(result.leads_contacted, 0);
    assert_eq!(h.agent.calls("lead_extraction"), 0);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_scraping() {
    let h = Harness::new(scripted_campaign(), MemoryLeadStore::new());

    let err = run_campaign(&h.deps(scraper()), &config(0, OutreachMethod::Both))
        .await
        .unwrap_err();

    assert!(matches!(err, LeadreachError::Validation(_)));
    assert_eq!(h.agent.calls("lead_extraction"), 0);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn default_batch_size_splits_twenty_five_items_into_three_calls() {
    let items = (1..=25)
        .map(|n| raw_item(&format!("https://www.reddit.com/r/learnmath/comments/{n}"), "help please"))
        .collect();
    let agent = ScriptedAgent::new().respond("lead_extraction", "[]");
    let h = Harness::new(agent, MemoryLeadStore::new());
    let deps = h.deps(Arc::new(StaticScraper::new().on_target(WORKING, items)));
    assert_eq!(deps.settings.batch_size, DEFAULT_BATCH_SIZE);

    let result = run_campaign(&deps, &config(10, OutreachMethod::Both)).await.unwrap();

    assert_eq!(result.leads_processed, 25);
    assert_eq!(h.agent.calls("lead_extraction"), 3);
    let prompts = h.agent.prompts("lead_extraction");
    assert!(prompts[2].contains("comments/21") && prompts[2].contains("comments/25"));
    assert!(!prompts[2].contains("comments/11"));
}
