//! Public basketball fallback: balldontlie.io.
//!
//! Keyless free tier, so it stays useful when the primary basketball feed is
//! down or unconfigured. Carries only schedule data; stats default.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::coerce::{parse_kickoff, safe_str};
use crate::providers::ProviderAdapter;
use crate::store::models::{Fixture, Sport};

pub struct BallDontLie {
    http: Client,
    base_url: String,
}

impl BallDontLie {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(BallDontLie {
            http,
            base_url: base_url
                .unwrap_or("https://api.balldontlie.io/v1")
                .to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for BallDontLie {
    fn name(&self) -> &str {
        "balldontlie"
    }

    fn sport(&self) -> Sport {
        Sport::Basketball
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        let url = format!(
            "{}/games?dates[]={}",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        debug!("Fetching NBA games from {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("balldontlie request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("balldontlie error: {}", resp.status());
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse balldontlie response")?;

        Ok(parse_games_response(&raw))
    }
}

pub(crate) fn parse_games_response(raw: &Value) -> Vec<Fixture> {
    let games = match raw["data"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    games
        .iter()
        .map(|g| Fixture {
            sport: Sport::Basketball,
            league: "NBA".to_string(),
            home_team: safe_str(&g["home_team"]["full_name"]),
            away_team: safe_str(&g["visitor_team"]["full_name"]),
            kickoff_utc: parse_kickoff(&safe_str(&g["date"])),
            ..Fixture::default()
        })
        .collect()
}
