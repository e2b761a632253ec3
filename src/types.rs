use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fingerprint;

/// The fetched article at run time. Never persisted; consumed by date
/// extraction and the provider call within a single run.
#[derive(Debug, Clone)]
pub struct ArticleSnapshot {
    pub raw_text: String,
    pub fingerprint: String,
}

impl ArticleSnapshot {
    pub fn new(raw_text: String) -> Self {
        let fingerprint = fingerprint::fingerprint(&raw_text);
        Self {
            raw_text,
            fingerprint,
        }
    }
}

/// Normalized market-sentiment verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Mixed,
    Unknown,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Mixed => "Mixed",
            Sentiment::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One durable sentiment verdict, keyed by publication date. The ledger
/// holds at most one of these per date; a later run for the same date
/// replaces the row wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub publish_date: NaiveDate,
    /// The date expression exactly as it appeared in the article.
    pub raw_publish: String,
    pub sentiment: Sentiment,
    pub provider_name: String,
    pub model_version: String,
    pub content_fingerprint: String,
    /// Verbatim provider output, kept for audit.
    pub raw_response: String,
}

/// How a run ended. Both variants are success: `SkippedUnchanged` means the
/// ledger already held today's verdict for identical article content, so no
/// provider call was made and no row was rewritten.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Recorded(PublishRecord),
    SkippedUnchanged(PublishRecord),
}

impl RunOutcome {
    pub fn record(&self) -> &PublishRecord {
        match self {
            RunOutcome::Recorded(r) | RunOutcome::SkippedUnchanged(r) => r,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("article fetch failed: {0}")]
    Fetch(String),

    #[error("could not extract a publish date from the article")]
    DateNotFound,

    #[error("provider error: {message}")]
    Provider { message: String, transient: bool },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger format error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// True for provider failures the caller may retry with backoff
    /// (rate limits, connection drops). Everything else aborts the run.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Provider { transient: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
