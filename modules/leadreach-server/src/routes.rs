use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use leadreach_common::{CampaignConfig, LeadreachError};
use leadreach_outreach::{all_templates, campaign_template, handle_reply, run_campaign, OutreachDeps};

const ADMIN_KEY_HEADER: &str = "x-admin-key";
const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub const SUPPORTED_SOURCES: [&str; 3] = ["textr", "twilio", "generic_sms"];

#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<OutreachDeps>,
    /// None rejects every campaign request.
    pub admin_api_key: Option<String>,
    /// None rejects every webhook call.
    pub webhook_secret: Option<String>,
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/outreach/campaign", get(list_templates).post(start_campaign))
        .route("/api/outreach/webhook", get(webhook_status).post(receive_reply))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub enum ApiError {
    Unauthorized(&'static str),
    BadRequest(String),
    InvalidPayload(String),
    Internal {
        context: &'static str,
        source: LeadreachError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(error) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": error }))).into_response()
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid campaign configuration", "message": message })),
            )
                .into_response(),
            ApiError::InvalidPayload(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid webhook payload", "message": message })),
            )
                .into_response(),
            ApiError::Internal { context, source } => {
                tracing::error!(error = %source, "{context}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": context, "message": source.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Constant-time comparison of a request header against a configured secret.
fn header_matches(headers: &HeaderMap, name: &str, expected: Option<&str>) -> bool {
    let (Some(expected), Some(given)) = (
        expected,
        headers.get(name).and_then(|v| v.to_str().ok()),
    ) else {
        return false;
    };
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if header_matches(headers, ADMIN_KEY_HEADER, state.admin_api_key.as_deref()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Unauthorized"))
    }
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub campaign_type: Option<String>,
    pub custom_config: Option<CampaignConfig>,
}

impl CampaignRequest {
    /// A known template name wins over a custom config.
    fn resolve(self) -> Option<CampaignConfig> {
        self.campaign_type
            .as_deref()
            .and_then(campaign_template)
            .or(self.custom_config)
    }
}

async fn start_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let config = request
        .resolve()
        .ok_or_else(|| ApiError::BadRequest("Provide a known campaignType or a customConfig".into()))?;

    tracing::info!(
        targets = config.targets.len(),
        max_leads = config.max_leads,
        "Campaign requested"
    );

    let result = run_campaign(&state.deps, &config)
        .await
        .map_err(|e| match e {
            LeadreachError::Validation(message) => ApiError::BadRequest(message),
            other => ApiError::Internal {
                context: "Failed to run outreach campaign",
                source: other,
            },
        })?;

    let message = format!(
        "Campaign completed successfully. Contacted {} leads.",
        result.leads_contacted
    );
    Ok(Json(json!({
        "success": true,
        "result": result,
        "message": message,
    })))
}

async fn list_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers)?;

    let templates = all_templates();
    let names: Vec<&str> = templates.iter().map(|(name, _)| *name).collect();
    let bodies: serde_json::Map<String, Value> = templates
        .iter()
        .map(|(name, config)| Ok((name.to_string(), serde_json::to_value(config)?)))
        .collect::<Result<_, serde_json::Error>>()
        .map_err(|e| ApiError::Internal {
            context: "Failed to get campaign status",
            source: LeadreachError::Anyhow(e.into()),
        })?;

    Ok(Json(json!({
        "templates": names,
        "campaignTemplates": bodies,
    })))
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InboundReply {
    pub phone: String,
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
}

async fn receive_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    // The body is not looked at until the caller is authenticated.
    if !header_matches(&headers, WEBHOOK_SECRET_HEADER, state.webhook_secret.as_deref()) {
        return Err(ApiError::Unauthorized("Invalid webhook secret"));
    }
    let reply: InboundReply =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    tracing::info!(
        phone = %reply.phone,
        source = reply.source.as_deref().unwrap_or("unknown"),
        "Received SMS reply"
    );

    let outcome = handle_reply(&state.deps, &reply.phone, &reply.message)
        .await
        .map_err(|e| ApiError::Internal {
            context: "Failed to process SMS response",
            source: e,
        })?;

    tracing::info!(
        matched = outcome.matched(),
        status = ?outcome.status,
        interest_level = ?outcome.interest_level,
        next_action = ?outcome.next_action,
        auto_reply_sent = outcome.auto_reply_sent,
        "SMS reply processed"
    );

    Ok(Json(json!({
        "success": true,
        "message": "SMS response processed successfully",
    })))
}

async fn webhook_status() -> Json<Value> {
    Json(json!({
        "message": "Outreach webhook endpoint is active",
        "supportedSources": SUPPORTED_SOURCES,
    }))
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use leadreach_common::OutreachStatus;
    use leadreach_outreach::testing::{
        raw_item, stored_lead, test_deps, MemoryLeadStore, RecordingChannel,
        RecordingFollowupSink, ScriptedAgent, StaticScraper,
    };
    use tower::ServiceExt;

    const ADMIN: &str = "admin-secret";
    const WEBHOOK: &str = "hook-secret";

    struct TestApp {
        router: Router,
        store: Arc<MemoryLeadStore>,
        channel: Arc<RecordingChannel>,
    }

    fn app(agent: ScriptedAgent, store: MemoryLeadStore, scraper: StaticScraper) -> TestApp {
        let store = Arc::new(store);
        let channel = Arc::new(RecordingChannel::new());
        let deps = test_deps(
            Arc::new(agent),
            store.clone(),
            channel.clone(),
            Arc::new(scraper),
            Arc::new(RecordingFollowupSink::new()),
        );
        let router = build_router(
            AppState {
                deps: Arc::new(deps),
                admin_api_key: Some(ADMIN.to_string()),
                webhook_secret: Some(WEBHOOK.to_string()),
            },
            &[],
        );
        TestApp {
            router,
            store,
            channel,
        }
    }

    fn empty_app() -> TestApp {
        app(ScriptedAgent::new(), MemoryLeadStore::new(), StaticScraper::new())
    }

    fn post(uri: &str, header: (&str, &str), body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(header.0, header.1)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = empty_app()
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn campaign_requires_admin_key() {
        let (status, _) = send(
            empty_app().router,
            post(
                "/api/outreach/campaign",
                (ADMIN_KEY_HEADER, "wrong"),
                json!({ "campaignType": "physicsStudents" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_secret_rejects_everything() {
        let mut test = empty_app();
        test.router = build_router(
            AppState {
                deps: Arc::new(test_deps(
                    Arc::new(ScriptedAgent::new()),
                    test.store.clone(),
                    test.channel.clone(),
                    Arc::new(StaticScraper::new()),
                    Arc::new(RecordingFollowupSink::new()),
                )),
                admin_api_key: None,
                webhook_secret: None,
            },
            &[],
        );

        let request = Request::builder()
            .uri("/api/outreach/campaign")
            .header(ADMIN_KEY_HEADER, "")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(test.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn campaign_without_config_is_bad_request() {
        let (status, body) = send(
            empty_app().router,
            post(
                "/api/outreach/campaign",
                (ADMIN_KEY_HEADER, ADMIN),
                json!({ "campaignType": "chemistryNerds" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid campaign configuration");
    }

    #[tokio::test]
    async fn invalid_custom_config_is_bad_request() {
        let (status, _) = send(
            empty_app().router,
            post(
                "/api/outreach/campaign",
                (ADMIN_KEY_HEADER, ADMIN),
                json!({ "customConfig": {
                    "targets": [],
                    "maxLeads": 0,
                    "outreachMethod": "both"
                }}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn custom_campaign_runs_and_reports() {
        let target = "https://reddit.com/r/learnmath";
        let post_url = "https://www.reddit.com/r/learnmath/comments/9";
        let agent = ScriptedAgent::new()
            .respond(
                "lead_extraction",
                &format!(r#"[{{"sourceUrl": "{post_url}", "phone": "+15550001111"}}]"#),
            )
            .respond("lead_scoring", "80")
            .respond("outreach_message", "Hi there");
        let scraper = StaticScraper::new().on_target(target, vec![raw_item(post_url, "need help")]);
        let test = app(agent, MemoryLeadStore::new(), scraper);

        let (status, body) = send(
            test.router,
            post(
                "/api/outreach/campaign",
                (ADMIN_KEY_HEADER, ADMIN),
                json!({ "customConfig": {
                    "targets": [{ "platform": "social_forum", "url": target, "keywords": ["help"] }],
                    "maxLeads": 5,
                    "outreachMethod": "both"
                }}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["leadsContacted"], 1);
        assert_eq!(
            body["message"],
            "Campaign completed successfully. Contacted 1 leads."
        );
        assert_eq!(test.store.leads().len(), 1);
        assert_eq!(test.channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_is_internal_error() {
        let target = "https://reddit.com/r/learnmath";
        let post_url = "https://www.reddit.com/r/learnmath/comments/9";
        let agent = ScriptedAgent::new()
            .respond("lead_extraction", &format!(r#"[{{"sourceUrl": "{post_url}"}}]"#))
            .respond("lead_scoring", "80");
        let scraper = StaticScraper::new().on_target(target, vec![raw_item(post_url, "need help")]);
        let test = app(agent, MemoryLeadStore::new().failing_inserts(), scraper);

        let (status, body) = send(
            test.router,
            post(
                "/api/outreach/campaign",
                (ADMIN_KEY_HEADER, ADMIN),
                json!({ "customConfig": {
                    "targets": [{ "platform": "social_forum", "url": target, "keywords": [] }],
                    "maxLeads": 5,
                    "outreachMethod": "both"
                }}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to run outreach campaign");
    }

    #[tokio::test]
    async fn lists_templates() {
        let request = Request::builder()
            .uri("/api/outreach/campaign")
            .header(ADMIN_KEY_HEADER, ADMIN)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(empty_app().router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["templates"], json!(["redditMathHelp", "physicsStudents"]));
        assert_eq!(body["campaignTemplates"]["physicsStudents"]["maxLeads"], 30);
    }

    #[tokio::test]
    async fn webhook_requires_secret() {
        let (status, body) = send(
            empty_app().router,
            post(
                "/api/outreach/webhook",
                (WEBHOOK_SECRET_HEADER, "nope"),
                json!({ "phone": "+15551234567", "message": "yes" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid webhook secret");
    }

    #[tokio::test]
    async fn webhook_unknown_phone_is_success() {
        let (status, body) = send(
            empty_app().router,
            post(
                "/api/outreach/webhook",
                (WEBHOOK_SECRET_HEADER, WEBHOOK),
                json!({ "phone": "+15550000000", "message": "yes", "source": "twilio" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "SMS response processed successfully");
    }

    #[tokio::test]
    async fn webhook_marks_lead_responded() {
        let phone = "+15551234567";
        let agent = ScriptedAgent::new().respond(
            "reply_classification",
            r#"{"interest_level": "high", "next_action": "schedule_demo", "suggested_reply": "Great!"}"#,
        );
        let store = MemoryLeadStore::with_leads(vec![stored_lead(phone, OutreachStatus::Contacted)]);
        let test = app(agent, store, StaticScraper::new());

        let (status, body) = send(
            test.router,
            post(
                "/api/outreach/webhook",
                (WEBHOOK_SECRET_HEADER, WEBHOOK),
                json!({ "phone": phone, "message": "tell me more" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "message": "SMS response processed successfully" }));
        assert_eq!(test.store.leads()[0].outreach_status, OutreachStatus::Responded);
        let sent = test.channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].phone, phone);
    }

    fn raw_post(uri: &str, header: (&str, &str), body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(header.0, header.1)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn webhook_checks_secret_before_reading_body() {
        let (status, body) = send(
            empty_app().router,
            raw_post("/api/outreach/webhook", (WEBHOOK_SECRET_HEADER, "nope"), "{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid webhook secret");
    }

    #[tokio::test]
    async fn webhook_malformed_body_is_bad_request() {
        let test = empty_app();
        let (status, body) = send(
            test.router,
            raw_post("/api/outreach/webhook", (WEBHOOK_SECRET_HEADER, WEBHOOK), r#"{"phone": 5}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid webhook payload");
        assert_eq!(test.store.write_count(), 0);
    }

    #[tokio::test]
    async fn webhook_status_lists_sources() {
        let request = Request::builder()
            .uri("/api/outreach/webhook")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(empty_app().router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["supportedSources"], json!(["textr", "twilio", "generic_sms"]));
    }

    #[test]
    fn header_comparison() {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, "abc".parse().unwrap());
        assert!(header_matches(&headers, ADMIN_KEY_HEADER, Some("abc")));
        assert!(!header_matches(&headers, ADMIN_KEY_HEADER, Some("abcd")));
        assert!(!header_matches(&headers, ADMIN_KEY_HEADER, None));
        assert!(!header_matches(&headers, WEBHOOK_SECRET_HEADER, Some("abc")));
    }
}
