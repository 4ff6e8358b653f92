use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quotefuse_core::fetch::alphavantage::AlphaVantageClient;

mod run;

#[derive(Debug, Parser)]
#[command(name = "quotefuse_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume the price fetch queue and stage quotes.
    PriceFetcher(run::RunArgs),

    /// Consume the sentiment fetch queue and stage aggregated scores.
    SentimentFetcher(run::RunArgs),

    /// Consume staging change events and join completed pairs.
    Reconciler(run::RunArgs),

    /// Enqueue every registered symbol onto both fetch queues.
    Dispatch,

    /// Register symbols in the dispatch registry.
    AddSymbols {
        /// Comma-separated ticker symbols (e.g. AAPL,MSFT).
        #[arg(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = quotefuse_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    quotefuse_core::storage::migrate(&pool).await?;

    match args.command {
        Command::PriceFetcher(run_args) => {
            let client = AlphaVantageClient::from_settings(&settings)?;
            run::run_fetcher(&pool, &client, run::FetcherRole::Price, &run_args).await?;
        }
        Command::SentimentFetcher(run_args) => {
            let client = AlphaVantageClient::from_settings(&settings)?;
            run::run_fetcher(&pool, &client, run::FetcherRole::Sentiment, &run_args).await?;
        }
        Command::Reconciler(run_args) => {
            run::run_reconciler(&pool, &run_args).await?;
        }
        Command::Dispatch => {
            let enqueued = quotefuse_core::pipeline::dispatch::dispatch_symbols(&pool).await?;
            tracing::info!(enqueued, "dispatch complete");
        }
        Command::AddSymbols { symbols } => {
            let mut added: usize = 0;
            for symbol in &symbols {
                if quotefuse_core::storage::symbols::add(&pool, symbol).await? {
                    added += 1;
                }
            }
            tracing::info!(requested = symbols.len(), added, "symbol registry updated");
        }
    }

    Ok(())
}

fn init_sentry(settings: &quotefuse_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
