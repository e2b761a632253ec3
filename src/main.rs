use clap::Parser;
use sentiment_ledger::{Config, RunOutcome, RunPipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Record today's market-sentiment verdict. Runs once and exits: 0 on a
/// recorded verdict or a clean duplicate skip, non-zero on any fatal error.
#[derive(Parser)]
#[command(name = "sentiment-ledger", version, about)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            // A missing .env is fine; the environment may carry everything.
            let _ = dotenvy::dotenv();
        }
    }

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    info!(
        "Starting sentiment run: provider={:?}, ledger={}",
        config.provider,
        config.ledger_path.display()
    );

    let pipeline = RunPipeline::from_config(&config)?;

    match pipeline.run().await? {
        RunOutcome::Recorded(record) => {
            println!(
                "Recorded {} sentiment for {}: {}",
                record.provider_name, record.publish_date, record.sentiment
            );
        }
        RunOutcome::SkippedUnchanged(record) => {
            println!(
                "Unchanged article for {}; kept existing verdict: {}",
                record.publish_date, record.sentiment
            );
        }
    }

    Ok(())
}
