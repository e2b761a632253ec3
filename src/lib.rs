pub mod config;
pub mod fetch;
pub mod fingerprint;
pub mod ledger;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod publish_date;
pub mod types;
pub mod util;

pub use config::Config;
pub use fetch::{ArticleSource, HttpArticleSource};
pub use ledger::CsvLedger;
pub use notify::PushNotifier;
pub use pipeline::RunPipeline;
pub use provider::{
    AnthropicProvider, MockProvider, OpenAiProvider, ProviderKind, SentimentProvider,
    SentimentQuery, SentimentResult,
};
pub use publish_date::PublishDateExtractor;
pub use types::{
    ArticleSnapshot, LedgerError, PublishRecord, Result, RunOutcome, Sentiment,
};
