use std::collections::HashMap;

pub mod models;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ApiErrorBody, MessageResponse};

const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Check if a string is a valid phone number (E.164 format)
pub fn is_phone_number(identifier: &str) -> bool {
    identifier.starts_with('+')
        && identifier.len() >= 10
        && identifier[1..].chars().all(|c| c.is_ascii_digit())
}

/// Rewrite a human-formatted number as E.164. Ten-digit numbers without a
/// country code are taken as North American. Returns None when the text has
/// too few digits to be a phone number.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 || digits.len() > 15 {
        return None;
    }
    let normalized = if raw.starts_with('+') {
        format!("+{digits}")
    } else if let Some(national) = raw.strip_prefix("00") {
        format!("+{}", national.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
    } else if digits.len() == 10 {
        format!("+1{digits}")
    } else {
        format!("+{digits}")
    };
    is_phone_number(&normalized).then_some(normalized)
}

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("Invalid recipient: {0} (expected E.164, e.g. +15551234567)")]
    InvalidRecipient(String),

    #[error("Request to Twilio failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Twilio returned {status} (code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 format.
    pub from_number: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    http: Client,
    base_url: String,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            http: Client::new(),
            base_url: TWILIO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn from_number(&self) -> &str {
        &self.options.from_number
    }

    /// Send a text message through Programmable Messaging.
    pub async fn send_sms(&self, recipient: &str, body: &str) -> Result<MessageResponse, TwilioError> {
        if !is_phone_number(recipient) {
            return Err(TwilioError::InvalidRecipient(recipient.to_string()));
        }

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.options.account_sid
        );

        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", recipient);
        form_body.insert("From", &self.options.from_number);
        form_body.insert("Body", body);

        let response = self
            .http
            .post(url)
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_body, "Twilio message send failed");

            let parsed = serde_json::from_str::<ApiErrorBody>(&error_body).ok();
            return Err(TwilioError::Api {
                status: status.as_u16(),
                code: parsed.as_ref().and_then(|b| b.code),
                message: parsed
                    .and_then(|b| b.message)
                    .unwrap_or(error_body),
            });
        }

        let message = response.json::<MessageResponse>().await?;
        debug!(sid = %message.sid, status = %message.status, "Twilio accepted message");
        Ok(message)
    }
}
