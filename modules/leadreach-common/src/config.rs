use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Product copy interpolated into fallback, follow-up and auto-reply messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub product_name: String,
    pub product_url: String,
    pub trial_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            product_name: "AI-TORIUM".to_string(),
            product_url: "ai-torium.com".to_string(),
            trial_url: "ai-torium.com/trial".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Server
    pub port: u16,
    pub allowed_origins: Vec<String>,

    // AI
    pub anthropic_api_key: String,
    pub anthropic_model: String,

    // Scraping
    pub serper_api_key: Option<String>,

    // Messaging channel. None = simulated sends.
    pub twilio: Option<TwilioCredentials>,

    // Shared secrets. None = endpoint rejects every request.
    pub admin_api_key: Option<String>,
    pub webhook_secret: Option<String>,

    // Pipeline tunables
    pub extraction_batch_size: usize,
    pub send_interval_ms: u64,
    pub followup_delay_hours: i64,

    pub branding: Branding,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Branding::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            port: parse_or("PORT", 9080)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY is required")?,
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5-20250929".to_string()),
            serper_api_key: optional("SERPER_API_KEY"),
            twilio: twilio_from_env(),
            admin_api_key: optional("ADMIN_API_KEY"),
            webhook_secret: optional("OUTREACH_WEBHOOK_SECRET"),
            extraction_batch_size: parse_or("EXTRACTION_BATCH_SIZE", 10usize)?.max(1),
            send_interval_ms: parse_or("SEND_INTERVAL_MS", 1000)?,
            followup_delay_hours: parse_or("FOLLOWUP_DELAY_HOURS", 72)?,
            branding: Branding {
                product_name: optional("PRODUCT_NAME").unwrap_or(defaults.product_name),
                product_url: optional("PRODUCT_URL").unwrap_or(defaults.product_url),
                trial_url: optional("TRIAL_URL").unwrap_or(defaults.trial_url),
            },
        })
    }
}

/// All three Twilio variables must be set for real sends.
fn twilio_from_env() -> Option<TwilioCredentials> {
    Some(TwilioCredentials {
        account_sid: optional("TWILIO_ACCOUNT_SID")?,
        auth_token: optional("TWILIO_AUTH_TOKEN")?,
        from_number: optional("TWILIO_FROM_NUMBER")?,
    })
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}
