use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod coerce;
mod config;
mod leagues;
mod model;
mod pipeline;
mod providers;
mod retry;
mod store;

use config::Config;
use model::TrainConfig;
use pipeline::{Pipeline, PipelineConfig};
use providers::{
    Aggregator, ApiBasketball, ApiFootball, BallDontLie, FootballData, ProviderAdapter,
    TheSportsDb,
};
use retry::RetryPolicy;
use store::models::Sport;
use store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let sports = config.parse_sports()?;
    info!("Ingesting sports: {:?}", sports);

    // Open the store
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    info!("Database opened: {}", config.database_path);

    // Build provider adapters. Sports with a primary and a secondary feed
    // register both; duplicates across feeds collapse at upsert time.
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
    for sport in &sports {
        match sport {
            Sport::Football => {
                adapters.push(Arc::new(ApiFootball::new(
                    config.apisports_key.as_deref(),
                    None,
                )?));
                adapters.push(Arc::new(FootballData::new(
                    config.footballdata_key.as_deref(),
                    None,
                )?));
            }
            Sport::Basketball => {
                adapters.push(Arc::new(ApiBasketball::new(
                    config.apisports_key.as_deref(),
                    None,
                )?));
                adapters.push(Arc::new(BallDontLie::new(None)?));
            }
            Sport::Baseball => {
                adapters.push(Arc::new(TheSportsDb::new(
                    Sport::Baseball,
                    config.sportsdb_key.as_deref(),
                    None,
                )?));
            }
            Sport::Hockey => {
                adapters.push(Arc::new(TheSportsDb::new(
                    Sport::Hockey,
                    config.sportsdb_key.as_deref(),
                    None,
                )?));
            }
        }
    }
    info!("Configured {} provider adapter(s)", adapters.len());

    let aggregator = Aggregator::new(
        adapters,
        Duration::from_secs(config.provider_timeout_secs),
    );
    let policy = RetryPolicy::new(
        config.store_retry_attempts,
        Duration::from_millis(config.store_retry_delay_ms),
    );
    let pipeline_config = PipelineConfig {
        sports,
        train: TrainConfig {
            use_synthetic_labels: config.use_synthetic_labels,
            ..TrainConfig::default()
        },
        model_confidence: config.model_confidence,
    };
    let pipeline = Pipeline::new(store, aggregator, policy, pipeline_config);

    if config.run_once {
        let report = pipeline.run(chrono::Utc::now().date_naive()).await;
        log_report(&report);
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(
        "Pipeline loop started (every {} s)",
        config.poll_interval_secs
    );
    loop {
        interval.tick().await;
        let report = pipeline.run(chrono::Utc::now().date_naive()).await;
        log_report(&report);
    }
}

fn log_report(report: &pipeline::RunReport) {
    info!(
        "run finished: status={:?} fixtures={} leagues={} predictions={} failed={} failed_providers={:?}",
        report.status(),
        report.ingest.fixtures_written,
        report.ingest.leagues_written,
        report.predict.predictions_written,
        report.failed_records(),
        report.ingest.failed_providers,
    );
}
