//! Pre-configured campaigns, addressable by name.

use leadreach_common::{CampaignConfig, OutreachMethod, Platform, ScrapingTarget};

pub const TEMPLATE_NAMES: [&str; 2] = ["redditMathHelp", "physicsStudents"];

pub fn campaign_template(name: &str) -> Option<CampaignConfig> {
    match name {
        "redditMathHelp" => Some(CampaignConfig {
            targets: vec![
                ScrapingTarget::new(
                    Platform::SocialForum,
                    "https://reddit.com/r/HomeworkHelp",
                    &["math", "calculus", "algebra", "geometry", "statistics"],
                ),
                ScrapingTarget::new(
                    Platform::SocialForum,
                    "https://reddit.com/r/learnmath",
                    &["help", "stuck", "confused", "exam"],
                ),
            ],
            max_leads: 50,
            outreach_method: OutreachMethod::DispatchOnly,
            message_template: Some(
                "Hi! Saw you need help with {subject}. AI-TORIUM gives instant step-by-step explanations. Try free: ai-torium.com"
                    .to_string(),
            ),
        }),
        "physicsStudents" => Some(CampaignConfig {
            targets: vec![ScrapingTarget::new(
                Platform::SocialForum,
                "https://reddit.com/r/AskPhysics",
                &["homework", "problem", "help", "stuck"],
            )],
            max_leads: 30,
            outreach_method: OutreachMethod::DispatchOnly,
            message_template: None,
        }),
        _ => None,
    }
}

/// Every template, in `TEMPLATE_NAMES` order.
pub fn all_templates() -> Vec<(&'static str, CampaignConfig)> {
    TEMPLATE_NAMES
        .iter()
        .filter_map(|name| campaign_template(name).map(|config| (*name, config)))
        .collect()
}
