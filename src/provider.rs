use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::types::{LedgerError, Result};
use crate::util::truncate_chars;

/// Characters of article text embedded in the prompt. Anything beyond this
/// adds cost without changing the verdict.
const PROMPT_ARTICLE_BUDGET: usize = 3000;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Request crossing the provider boundary: the article text plus a ceiling
/// on response length (label + short rationale fit comfortably in ~256).
#[derive(Debug, Clone)]
pub struct SentimentQuery {
    pub article_text: String,
    pub max_response_tokens: u32,
}

/// Verbatim provider output plus the concrete model that produced it.
#[derive(Debug, Clone)]
pub struct SentimentResult {
    pub text: String,
    pub model_version: String,
}

/// A language-model backend capable of producing a sentiment judgment from
/// article text. Exactly one implementation is active per run, selected
/// from configuration at startup; the orchestrator only sees this trait.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn infer(&self, query: &SentimentQuery) -> Result<SentimentResult>;
}

/// Which backend to use, parsed from the `USE_MODEL` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl std::str::FromStr for ProviderKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(LedgerError::Config(format!(
                "unknown provider '{}', expected 'openai' or 'anthropic'",
                other
            ))),
        }
    }
}

/// Build the analyst prompt. The model is told to lead with the label so
/// the normalizer can isolate it from whatever rationale follows.
fn build_prompt(article_text: &str) -> String {
    format!(
        "You are a financial analyst. Based on the following article, determine whether \
         the market sentiment for today is bullish, bearish, or mixed.\n\
         Respond with only one word: Bullish, Bearish, or Mixed at the start, followed by \
         2-3 key indicators that explain your reasoning.\n\n\
         Article:\n{}",
        truncate_chars(article_text, PROMPT_ARTICLE_BUDGET)
    )
}

/// Map a non-success HTTP status to a provider error. Rate limits are
/// transient; authentication and malformed-request failures are not.
fn provider_error_for_status(status: StatusCode, body: &str) -> LedgerError {
    let transient = status == StatusCode::TOO_MANY_REQUESTS;
    LedgerError::Provider {
        message: format!("HTTP {}: {}", status, truncate_chars(body, 300)),
        transient,
    }
}

/// Map a transport-level failure. Timeouts and connection drops may
/// succeed on retry; anything else aborts.
fn provider_error_for_transport(e: reqwest::Error) -> LedgerError {
    LedgerError::Provider {
        message: format!("request failed: {}", e),
        transient: e.is_timeout() || e.is_connect(),
    }
}

fn missing_content_error() -> LedgerError {
    LedgerError::Provider {
        message: "missing content in provider response".to_string(),
        transient: false,
    }
}

fn http_client() -> Client {
    Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}

/// OpenAI chat-completions backend.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub const DEFAULT_MODEL: &'static str = "gpt-4";

    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Point the provider at a different API root (local proxies, tests).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl SentimentProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn infer(&self, query: &SentimentQuery) -> Result<SentimentResult> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": build_prompt(&query.article_text) }
            ],
            "max_tokens": query.max_response_tokens,
            "temperature": 0
        });

        debug!("Requesting sentiment from OpenAI model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(provider_error_for_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error_for_status(status, &body));
        }

        let json: serde_json::Value = response.json().await.map_err(provider_error_for_transport)?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(missing_content_error)?;

        Ok(SentimentResult {
            text: content.trim().to_string(),
            model_version: self.model.clone(),
        })
    }
}

/// Anthropic messages backend.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub const DEFAULT_MODEL: &'static str = "claude-3-7-sonnet-20250219";

    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl SentimentProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn infer(&self, query: &SentimentQuery) -> Result<SentimentResult> {
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": query.max_response_tokens,
            "temperature": 0,
            "messages": [
                { "role": "user", "content": build_prompt(&query.article_text) }
            ]
        });

        debug!("Requesting sentiment from Anthropic model {}", self.model);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(provider_error_for_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error_for_status(status, &body));
        }

        let json: serde_json::Value = response.json().await.map_err(provider_error_for_transport)?;
        let content = json["content"][0]["text"]
            .as_str()
            .ok_or_else(missing_content_error)?;

        Ok(SentimentResult {
            text: content.trim().to_string(),
            model_version: self.model.clone(),
        })
    }
}

/// Construct the configured backend. Called once at startup; the pipeline
/// holds the result behind the trait and never branches on the kind again.
pub fn build_provider(config: &crate::config::Config) -> Result<Box<dyn SentimentProvider>> {
    let api_key = config.api_key()?.to_string();
    let provider: Box<dyn SentimentProvider> = match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(api_key)),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(api_key)),
    };
    Ok(provider)
}

/// Fixed-response provider for development and testing. Counts calls so
/// tests can assert whether inference was skipped.
pub struct MockProvider {
    response: String,
    model_version: String,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            model_version: "mock-1".to_string(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Shared handles count too, so a caller can keep one and hand another to
/// the pipeline.
#[async_trait]
impl<P: SentimentProvider + ?Sized> SentimentProvider for std::sync::Arc<P> {
    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    async fn infer(&self, query: &SentimentQuery) -> Result<SentimentResult> {
        (**self).infer(query).await
    }
}

#[async_trait]
impl SentimentProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn infer(&self, _query: &SentimentQuery) -> Result<SentimentResult> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(SentimentResult {
            text: self.response.clone(),
            model_version: self.model_version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("llama".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn prompt_leads_with_label_instruction_and_embeds_article() {
        let prompt = build_prompt("Stocks slid on weak retail data.");
        assert!(prompt.contains("Bullish, Bearish, or Mixed"));
        assert!(prompt.contains("Stocks slid on weak retail data."));
    }

    #[test]
    fn prompt_respects_article_budget() {
        let long_article = "a".repeat(10_000);
        let prompt = build_prompt(&long_article);
        assert!(prompt.len() < 3500);
    }

    #[test]
    fn rate_limit_status_is_transient() {
        let err = provider_error_for_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_transient());
    }

    #[test]
    fn auth_and_bad_request_statuses_are_fatal() {
        assert!(!provider_error_for_status(StatusCode::UNAUTHORIZED, "bad key").is_transient());
        assert!(!provider_error_for_status(StatusCode::BAD_REQUEST, "malformed").is_transient());
    }
}
