use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{LedgerError, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 2;

/// Where today's article comes from. The pipeline only sees this trait, so
/// tests can feed it canned HTML.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn source_name(&self) -> String;

    /// Fetch the raw article HTML. Failure is fatal for the run.
    async fn fetch_html(&self) -> Result<String>;
}

/// HTTP article source with a browser-like user agent, bounded timeout and
/// a short retry envelope for flaky connections.
pub struct HttpArticleSource {
    client: Client,
    url: String,
}

impl HttpArticleSource {
    pub fn new(url: String) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(FETCH_TIMEOUT)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, url }
    }
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    fn source_name(&self) -> String {
        self.url.clone()
    }

    async fn fetch_html(&self) -> Result<String> {
        let mut backoff = ExponentialBackoff {
            current_interval: Duration::from_secs(1),
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            debug!("Fetching article from {} (attempt {})", self.url, attempt + 1);

            match self.client.get(&self.url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let html = response.text().await?;
                        info!("Fetched article: {} ({} bytes)", self.url, html.len());
                        return Ok(html);
                    }
                    last_error = format!(
                        "HTTP {}: {}",
                        status,
                        status.canonical_reason().unwrap_or("Unknown")
                    );
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < MAX_RETRIES {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "Attempt {} failed for {} ({}), retrying in {:?}",
                        attempt + 1,
                        self.url,
                        last_error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
        }

        Err(LedgerError::Fetch(format!(
            "{} unavailable: {}",
            self.url, last_error
        )))
    }
}

/// Reduce article HTML to plain text: the trimmed text of every non-empty
/// `<p>` element, newline-joined.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p").expect("p selector must parse");

    let mut paragraphs = Vec::new();
    for node in document.select(&paragraph) {
        let text = node.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            paragraphs.push(text.to_string());
        }
    }

    paragraphs.join("\n")
}
