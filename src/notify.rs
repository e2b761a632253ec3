use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::PublishRecord;
use crate::util::truncate_chars;

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Pushover truncates long messages; keep the rationale under the
/// transport ceiling.
const RESPONSE_CHAR_LIMIT: usize = 400;

/// Build the one-shot push message for a recorded verdict. Carries the
/// normalized date, the article's own date text, the label, and as much of
/// the model's rationale as the transport allows.
pub fn push_message(record: &PublishRecord) -> String {
    format!(
        "{} ({}) - Sentiment: {}\n{}\nModel: {}",
        record.publish_date,
        record.raw_publish,
        record.sentiment,
        truncate_chars(&record.raw_response, RESPONSE_CHAR_LIMIT),
        record.model_version
    )
}

/// Best-effort push notification channel. A run that has recorded its
/// verdict never fails because the push did not go through: missing
/// credentials and transport errors both downgrade to warnings.
pub struct PushNotifier {
    client: Client,
    user_key: Option<String>,
    api_token: Option<String>,
    api_url: String,
}

impl PushNotifier {
    pub fn new(user_key: Option<String>, api_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            user_key,
            api_token,
            api_url: PUSHOVER_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    pub async fn notify(&self, message: &str) {
        let (user, token) = match (&self.user_key, &self.api_token) {
            (Some(user), Some(token)) => (user, token),
            _ => {
                warn!("Pushover credentials not configured, skipping notification");
                return;
            }
        };

        let payload = [
            ("token", token.as_str()),
            ("user", user.as_str()),
            ("message", message),
        ];

        match self.client.post(&self.api_url).form(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Push notification sent");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!("Pushover notification failed: HTTP {} {}", status, body);
            }
            Err(e) => {
                warn!("Pushover notification failed: {}", e);
            }
        }
    }
}
