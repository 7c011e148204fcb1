use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use leadreach_common::Config;
use leadreach_outreach::scraping::http_client;
use leadreach_outreach::{
    channel_from_credentials, OutreachDeps, PgLeadStore, PipelineSettings, ScraperRegistry,
};
use leadreach_server::routes::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting leadreach-server");

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    let http = http_client()?;

    let claude = ai_client::Claude::new(&config.anthropic_api_key, &config.anthropic_model)
        .with_http_client(http.clone());

    let deps = OutreachDeps::builder()
        .agent(Arc::new(claude))
        .store(Arc::new(PgLeadStore::new(pool)))
        .channel(channel_from_credentials(config.twilio.as_ref()))
        .scrapers(ScraperRegistry::standard(http, config.serper_api_key.clone()))
        .settings(PipelineSettings::from_config(&config))
        .build();

    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set, campaign endpoints will reject every request");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("OUTREACH_WEBHOOK_SECRET not set, webhook will reject every request");
    }

    let app = routes::build_router(
        AppState {
            deps: Arc::new(deps),
            admin_api_key: config.admin_api_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        },
        &config.allowed_origins,
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
