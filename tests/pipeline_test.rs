use async_trait::async_trait;
use chrono::NaiveDate;
use sentiment_ledger::{
    notify::push_message, ArticleSource, CsvLedger, LedgerError, MockProvider, PushNotifier,
    Result, RunOutcome, RunPipeline, Sentiment, SentimentProvider, SentimentQuery,
    SentimentResult,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tracing::info;

/// Serves a fixed HTML document, standing in for the article site.
struct StaticArticleSource {
    html: String,
}

impl StaticArticleSource {
    fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl ArticleSource for StaticArticleSource {
    fn source_name(&self) -> String {
        "static-test-article".to_string()
    }

    async fn fetch_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }
}

/// Always fails with a fatal provider error.
struct FailingProvider;

#[async_trait]
impl SentimentProvider for FailingProvider {
    fn provider_name(&self) -> &str {
        "failing"
    }

    async fn infer(&self, _query: &SentimentQuery) -> Result<SentimentResult> {
        Err(LedgerError::Provider {
            message: "invalid api key".to_string(),
            transient: false,
        })
    }
}

const BULLISH_ARTICLE: &str = "<html><body>\
    <p>Published as of: May 2, 2025, 9:15 a.m. ET</p>\
    <p>Stocks opened higher after a strong jobs report.</p>\
    <p>Traders priced in rate cuts for the fall.</p>\
    </body></html>";

fn pipeline_for(
    html: &str,
    provider: Arc<MockProvider>,
    ledger_path: &Path,
) -> RunPipeline {
    RunPipeline::new(
        Box::new(StaticArticleSource::new(html)),
        Box::new(provider),
        CsvLedger::new(ledger_path),
        PushNotifier::new(None, None),
    )
}

#[tokio::test]
async fn end_to_end_run_records_the_expected_verdict() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let provider = Arc::new(MockProvider::new(
        "Bullish\nStrong jobs report and rate-cut expectations.",
    ));
    let pipeline = pipeline_for(BULLISH_ARTICLE, provider.clone(), &ledger_path);

    let outcome = pipeline.run().await?;
    let record = match outcome {
        RunOutcome::Recorded(record) => record,
        other => panic!("expected Recorded, got {:?}", other),
    };

    assert_eq!(
        record.publish_date,
        NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()
    );
    assert_eq!(record.raw_publish, "May 2, 2025");
    assert_eq!(record.sentiment, Sentiment::Bullish);
    assert_eq!(
        record.raw_response,
        "Bullish\nStrong jobs report and rate-cut expectations."
    );
    assert_eq!(record.provider_name, "mock");
    assert_eq!(provider.call_count(), 1);

    // The verdict is durable.
    let stored = CsvLedger::new(&ledger_path)
        .find(record.publish_date)?
        .expect("record should be persisted");
    assert_eq!(stored, record);

    // The notification carries the normalized date and the label.
    let message = push_message(&record);
    assert!(message.contains("2025-05-02"));
    assert!(message.contains("Bullish"));

    info!("End-to-end run test completed successfully!");
    Ok(())
}

#[tokio::test]
async fn unchanged_article_skips_inference_on_the_second_run() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let provider = Arc::new(MockProvider::new("Bullish\nBroad rally."));
    let pipeline = pipeline_for(BULLISH_ARTICLE, provider.clone(), &ledger_path);

    let first = pipeline.run().await?;
    assert!(matches!(first, RunOutcome::Recorded(_)));
    assert_eq!(provider.call_count(), 1);

    let second = pipeline.run().await?;
    let reused = match second {
        RunOutcome::SkippedUnchanged(record) => record,
        other => panic!("expected SkippedUnchanged, got {:?}", other),
    };

    // No second provider call; the prior verdict is reused as-is.
    assert_eq!(provider.call_count(), 1);
    assert_eq!(reused.sentiment, Sentiment::Bullish);
    Ok(())
}

#[tokio::test]
async fn changed_content_for_the_same_date_replaces_the_record() -> Result<()> {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let first_provider = Arc::new(MockProvider::new("Bullish\nBroad rally."));
    pipeline_for(BULLISH_ARTICLE, first_provider.clone(), &ledger_path)
        .run()
        .await?;

    let revised_article = "<html><body>\
        <p>Published as of: May 2, 2025, 3:40 p.m. ET</p>\
        <p>Stocks gave back their gains into the close.</p>\
        </body></html>";
    let second_provider = Arc::new(MockProvider::new("Mixed, fading into the close."));
    let outcome = pipeline_for(revised_article, second_provider.clone(), &ledger_path)
        .run()
        .await?;

    assert!(matches!(outcome, RunOutcome::Recorded(_)));
    assert_eq!(second_provider.call_count(), 1);

    // Still one row for the date, now carrying the revised verdict.
    let date = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
    let stored = CsvLedger::new(&ledger_path).find(date)?.unwrap();
    assert_eq!(stored.sentiment, Sentiment::Mixed);
    Ok(())
}

#[tokio::test]
async fn missing_publish_date_fails_without_touching_the_ledger() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let provider = Arc::new(MockProvider::new("Bullish"));
    let pipeline = pipeline_for(
        "<html><body><p>No date line anywhere in this story.</p></body></html>",
        provider.clone(),
        &ledger_path,
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, LedgerError::DateNotFound));
    assert_eq!(provider.call_count(), 0);
    assert!(!ledger_path.exists());
}

#[tokio::test]
async fn fatal_provider_error_aborts_before_any_record_is_written() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let pipeline = RunPipeline::new(
        Box::new(StaticArticleSource::new(BULLISH_ARTICLE)),
        Box::new(FailingProvider),
        CsvLedger::new(&ledger_path),
        PushNotifier::new(None, None),
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, LedgerError::Provider { .. }));
    assert!(!err.is_transient());
    assert!(!ledger_path.exists());
}

#[tokio::test]
async fn empty_article_body_is_a_fetch_failure() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let provider = Arc::new(MockProvider::new("Bullish"));
    let pipeline = pipeline_for(
        "<html><body><div>markup without paragraphs</div></body></html>",
        provider.clone(),
        &ledger_path,
    );

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, LedgerError::Fetch(_)));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn garbled_model_output_still_produces_a_record() -> Result<()> {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");

    let provider = Arc::new(MockProvider::new("I cannot determine the sentiment."));
    let outcome = pipeline_for(BULLISH_ARTICLE, provider, &ledger_path)
        .run()
        .await?;

    let record = match outcome {
        RunOutcome::Recorded(record) => record,
        other => panic!("expected Recorded, got {:?}", other),
    };
    assert_eq!(record.sentiment, Sentiment::Unknown);
    assert_eq!(record.raw_response, "I cannot determine the sentiment.");
    Ok(())
}
