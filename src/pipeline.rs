use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{self, ArticleSource, HttpArticleSource};
use crate::ledger::CsvLedger;
use crate::normalize;
use crate::notify::{self, PushNotifier};
use crate::provider::{build_provider, SentimentProvider, SentimentQuery, SentimentResult};
use crate::publish_date::PublishDateExtractor;
use crate::types::{ArticleSnapshot, LedgerError, PublishRecord, Result, RunOutcome};

/// Response ceiling passed to the provider; a label plus two or three
/// indicator lines fits comfortably.
pub const DEFAULT_MAX_RESPONSE_TOKENS: u32 = 256;

/// Transient provider failures are retried inside this envelope before the
/// run gives up.
const INFERENCE_RETRY_BUDGET: Duration = Duration::from_secs(120);

/// One end-to-end run: fetch, fingerprint, extract the publish date, check
/// the ledger, infer if the content is new, normalize, record, notify.
/// Linear and terminal on first failure; the ledger is only touched after
/// normalization has produced a complete record.
pub struct RunPipeline {
    source: Box<dyn ArticleSource>,
    extractor: PublishDateExtractor,
    provider: Box<dyn SentimentProvider>,
    ledger: CsvLedger,
    notifier: PushNotifier,
    max_response_tokens: u32,
}

impl RunPipeline {
    pub fn new(
        source: Box<dyn ArticleSource>,
        provider: Box<dyn SentimentProvider>,
        ledger: CsvLedger,
        notifier: PushNotifier,
    ) -> Self {
        Self {
            source,
            extractor: PublishDateExtractor::new(),
            provider,
            ledger,
            notifier,
            max_response_tokens: DEFAULT_MAX_RESPONSE_TOKENS,
        }
    }

    /// Wire up the real components from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Box::new(HttpArticleSource::new(config.article_url.clone()));
        let provider = build_provider(config)?;
        let ledger = CsvLedger::new(config.ledger_path.clone());
        let notifier = PushNotifier::new(
            config.pushover_user_key.clone(),
            config.pushover_api_token.clone(),
        );
        Ok(Self::new(source, provider, ledger, notifier))
    }

    pub fn with_max_response_tokens(mut self, max_response_tokens: u32) -> Self {
        self.max_response_tokens = max_response_tokens;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let html = self.source.fetch_html().await?;

        let text = fetch::extract_text(&html);
        if text.trim().is_empty() {
            return Err(LedgerError::Fetch(format!(
                "no article text extracted from {}",
                self.source.source_name()
            )));
        }
        let snapshot = ArticleSnapshot::new(text);
        info!("Extracted article text ({} chars)", snapshot.raw_text.len());

        let (publish_date, raw_publish) = self.extractor.extract(&snapshot.raw_text)?;
        info!("Article published on: {}", raw_publish);

        if let Some(existing) = self.ledger.find(publish_date)? {
            if existing.content_fingerprint == snapshot.fingerprint {
                info!(
                    "Ledger already holds {} for identical content, skipping inference",
                    publish_date
                );
                self.notifier.notify(&notify::push_message(&existing)).await;
                return Ok(RunOutcome::SkippedUnchanged(existing));
            }
            info!(
                "Article content changed since the recorded verdict for {}, re-inferring",
                publish_date
            );
        }

        let query = SentimentQuery {
            article_text: snapshot.raw_text.clone(),
            max_response_tokens: self.max_response_tokens,
        };
        let result = self.infer_with_retry(&query).await?;

        let sentiment = normalize::normalize(&result.text);
        let record = PublishRecord {
            publish_date,
            raw_publish,
            sentiment,
            provider_name: self.provider.provider_name().to_string(),
            model_version: result.model_version,
            content_fingerprint: snapshot.fingerprint,
            raw_response: result.text,
        };

        self.ledger.upsert(&record)?;
        info!("Sentiment for {}: {}", record.publish_date, record.sentiment);

        self.notifier.notify(&notify::push_message(&record)).await;

        Ok(RunOutcome::Recorded(record))
    }

    /// Call the provider, retrying transient failures (rate limits,
    /// connection drops) with exponential backoff. Fatal provider errors
    /// and an exhausted budget abort the run.
    async fn infer_with_retry(&self, query: &SentimentQuery) -> Result<SentimentResult> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(INFERENCE_RETRY_BUDGET),
            ..Default::default()
        };

        loop {
            match self.provider.infer(query).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!("Transient provider error ({}), retrying in {:?}", e, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
