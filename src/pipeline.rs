//! Pipeline orchestrator.
//!
//! One linear path: collect fixtures → persist leagues → persist fixtures →
//! train → predict per fixture → persist predictions. Failures are isolated
//! per stage and per record: a bad record is counted and skipped, a failed
//! provider contributes nothing, and the caller always gets a terminal
//! report instead of an error from inside the pipeline.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::leagues::LeagueRegistry;
use crate::model::{assemble_training_set, train, FeatureRow, TrainConfig, FIXED_CONFIDENCE};
use crate::providers::Aggregator;
use crate::retry::{retry, RetryPolicy};
use crate::store::models::{is_league_sentinel, Fixture, Prediction, Sport};
use crate::store::writer::{StoreWriter, UpsertOutcome};
use crate::store::{StoreError, TabularStore};

/// Fixed-text auxiliary markets attached to every prediction. These are
/// placeholders with placeholder confidence, not model output.
const MARKET_2: (&str, f64) = ("Under 2.5 goals", 0.55);
const MARKET_3: (&str, f64) = ("Both teams score", 0.52);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    PartialFailure,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub fixtures_written: usize,
    pub leagues_written: usize,
    /// Placeholder fixtures the writer refused (not failures).
    pub fixtures_skipped: usize,
    pub failed_records: usize,
    pub failed_providers: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PredictReport {
    pub predictions_written: usize,
    pub failed_records: usize,
    pub holdout_accuracy: Option<f64>,
}

/// Terminal result of one full pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub ingest: IngestReport,
    pub predict: PredictReport,
}

impl RunReport {
    pub fn failed_records(&self) -> usize {
        self.ingest.failed_records + self.predict.failed_records
    }

    pub fn status(&self) -> RunStatus {
        if self.failed_records() == 0 && self.ingest.failed_providers.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sports: Vec<Sport>,
    pub train: TrainConfig,
    /// Report the model's predicted-class probability instead of the fixed
    /// per-class confidence constants.
    pub model_confidence: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sports: Sport::all().to_vec(),
            train: TrainConfig::default(),
            model_confidence: false,
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn TabularStore>,
    writer: StoreWriter,
    registry: LeagueRegistry,
    aggregator: Aggregator,
    policy: RetryPolicy,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn TabularStore>,
        aggregator: Aggregator,
        policy: RetryPolicy,
        config: PipelineConfig,
    ) -> Self {
        Pipeline {
            writer: StoreWriter::new(store.clone(), policy),
            registry: LeagueRegistry::new(store.clone(), policy),
            store,
            aggregator,
            policy,
            config,
        }
    }

    /// Ingestion half of the pipeline: collect from every configured
    /// provider, then persist leagues and fixtures.
    pub async fn ingest_and_store(&self, date: NaiveDate) -> IngestReport {
        let mut report = IngestReport::default();

        let collected = self.aggregator.collect(&self.config.sports, date).await;
        report.failed_providers = collected.failed_providers;
        info!(
            "collected {} fixture(s), {} provider failure(s)",
            collected.fixtures.len(),
            report.failed_providers.len()
        );

        // Leagues first, deduplicated by name; fixture rows reference the
        // league by name, so a registry failure only costs the league row.
        let names: BTreeSet<&str> = collected
            .fixtures
            .iter()
            .map(|f| f.league.as_str())
            .filter(|n| !is_league_sentinel(n))
            .collect();
        for name in names {
            match self.registry.get_or_create(name).await {
                Ok(Some(_)) => report.leagues_written += 1,
                Ok(None) => {}
                Err(e) => {
                    error!("league {:?} not persisted: {}", name, e);
                    report.failed_records += 1;
                }
            }
        }

        for fixture in &collected.fixtures {
            match self.writer.write_fixture(fixture).await {
                Some(UpsertOutcome::Inserted) | Some(UpsertOutcome::Updated) => {
                    report.fixtures_written += 1;
                }
                Some(UpsertOutcome::Failed) => report.failed_records += 1,
                None => report.fixtures_skipped += 1,
            }
        }

        info!(
            "ingest done: {} fixture(s) written, {} league(s), {} skipped, {} failed",
            report.fixtures_written,
            report.leagues_written,
            report.fixtures_skipped,
            report.failed_records
        );
        report
    }

    /// Inference half of the pipeline: read persisted fixtures, train,
    /// predict per fixture, persist predictions.
    pub async fn predict(&self) -> PredictReport {
        let mut report = PredictReport::default();

        let rows = match retry(&self.policy, "fixtures_select", StoreError::is_transient, || {
            self.store.select_where("fixtures", &[])
        })
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("cannot read fixtures, skipping prediction stage: {}", e);
                report.failed_records += 1;
                return report;
            }
        };

        if rows.is_empty() {
            warn!("no fixtures in store, nothing to predict");
            return report;
        }

        let fixtures: Vec<Fixture> = rows.iter().map(Fixture::from_row).collect();
        let feature_rows: Vec<FeatureRow> =
            fixtures.iter().map(FeatureRow::from_fixture).collect();

        let mut rng = StdRng::from_entropy();
        let (train_rows, labels) =
            assemble_training_set(&feature_rows, &self.config.train, &mut rng);
        let model = train(&train_rows, &labels, &self.config.train, &mut rng);
        report.holdout_accuracy = model.holdout_accuracy;

        for (fixture, features) in fixtures.iter().zip(&feature_rows) {
            let (outcome, probs) = model.forecast(features);
            let class = outcome as usize;
            let raw_confidence = if self.config.model_confidence {
                probs[class]
            } else {
                FIXED_CONFIDENCE[class]
            };
            let confidence = raw_confidence.clamp(0.0, 1.0);

            let prediction = Prediction {
                sport: fixture.sport,
                league: fixture.league.clone(),
                match_name: fixture.match_name(),
                kickoff_utc: fixture.kickoff_utc,
                forecast: outcome,
                confidence,
                market_2: MARKET_2.0.to_string(),
                confidence_2: MARKET_2.1,
                market_3: MARKET_3.0.to_string(),
                confidence_3: MARKET_3.1,
            };

            match self.writer.write_prediction(&prediction).await {
                UpsertOutcome::Inserted | UpsertOutcome::Updated => {
                    report.predictions_written += 1;
                }
                UpsertOutcome::Failed => report.failed_records += 1,
            }
        }

        info!(
            "predict done: {} prediction(s) written, {} failed",
            report.predictions_written, report.failed_records
        );
        report
    }

    /// Full run: ingestion then prediction. Never fails mid-run; the report
    /// carries the terminal status.
    pub async fn run(&self, date: NaiveDate) -> RunReport {
        let ingest = self.ingest_and_store(date).await;
        let predict = self.predict().await;
        let report = RunReport { ingest, predict };
        match report.status() {
            RunStatus::Success => info!("pipeline run complete: success"),
            RunStatus::PartialFailure => warn!(
                "pipeline run complete: partial failure ({} failed record(s), failed providers: {:?})",
                report.failed_records(),
                report.ingest.failed_providers
            ),
        }
        report
    }
}
