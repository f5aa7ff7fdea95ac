use clap::Parser;

use crate::store::models::Sport;

/// Multi-source sports fixture ingestion and outcome-forecast pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "fixturecast", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "fixturecast.db")]
    pub database_path: String,

    /// API-Sports family key (football + basketball primaries)
    #[arg(long, env = "APISPORTS_KEY")]
    pub apisports_key: Option<String>,

    /// football-data.org token (secondary football feed)
    #[arg(long, env = "FOOTBALLDATA_KEY")]
    pub footballdata_key: Option<String>,

    /// TheSportsDB key (baseball/hockey; free-tier key used when unset)
    #[arg(long, env = "SPORTSDB_KEY")]
    pub sportsdb_key: Option<String>,

    /// Comma-separated sports to ingest
    #[arg(
        long,
        env = "SPORTS",
        default_value = "football,basketball,baseball,hockey"
    )]
    pub sports: String,

    /// Pipeline cadence in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "600")]
    pub poll_interval_secs: u64,

    /// Run one pipeline cycle and exit (no polling loop)
    #[arg(long, env = "RUN_ONCE", default_value = "false")]
    pub run_once: bool,

    /// Per-provider fetch timeout in seconds
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "10")]
    pub provider_timeout_secs: u64,

    /// Store retry bound per operation (including the first attempt)
    #[arg(long, env = "STORE_RETRY_ATTEMPTS", default_value = "3")]
    pub store_retry_attempts: u32,

    /// Fixed delay between store retry attempts, in milliseconds
    #[arg(long, env = "STORE_RETRY_DELAY_MS", default_value = "500")]
    pub store_retry_delay_ms: u64,

    /// Assign training labels at random (placeholder for a real results
    /// feed; disabling it only logs a warning until one is wired up)
    #[arg(long, env = "USE_SYNTHETIC_LABELS", default_value = "true")]
    pub use_synthetic_labels: bool,

    /// Report the model's predicted-class probability as the confidence
    /// instead of the fixed per-class constants
    #[arg(long, env = "MODEL_CONFIDENCE", default_value = "false")]
    pub model_confidence: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.provider_timeout_secs == 0 {
            anyhow::bail!("provider_timeout_secs must be positive");
        }
        if !(1..=10).contains(&self.store_retry_attempts) {
            anyhow::bail!("store_retry_attempts must be between 1 and 10");
        }
        if self.parse_sports()?.is_empty() {
            anyhow::bail!("at least one sport must be configured");
        }
        Ok(())
    }

    /// Parse the comma-separated sport list, rejecting unknown names.
    pub fn parse_sports(&self) -> anyhow::Result<Vec<Sport>> {
        let mut sports = Vec::new();
        for name in self.sports.split(',').filter(|s| !s.trim().is_empty()) {
            let sport = Sport::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown sport {:?} in --sports", name.trim()))?;
            if !sports.contains(&sport) {
                sports.push(sport);
            }
        }
        Ok(sports)
    }
}
