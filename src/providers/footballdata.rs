//! Secondary football provider: football-data.org (v4).
//!
//! Auth: `X-Auth-Token` header. The `matches` array carries schedule and
//! competition data but no form statistics, so the stat fields stay at their
//! documented defaults and downstream feature quality degrades instead of
//! the fetch failing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::coerce::{parse_kickoff, safe_str};
use crate::providers::ProviderAdapter;
use crate::store::models::{Fixture, Sport};

pub struct FootballData {
    http: Client,
    api_key: String,
    base_url: String,
}

impl FootballData {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(FootballData {
            http,
            api_key: api_key.unwrap_or_default().to_string(),
            base_url: base_url
                .unwrap_or("https://api.football-data.org/v4")
                .to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for FootballData {
    fn name(&self) -> &str {
        "football-data.org"
    }

    fn sport(&self) -> Sport {
        Sport::Football
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        let day = date.format("%Y-%m-%d");
        let url = format!("{}/matches?dateFrom={day}&dateTo={day}", self.base_url);
        debug!("Fetching football matches from {}", url);

        let resp = self
            .http
            .get(&url)
            .header("X-Auth-Token", &self.api_key)
            .send()
            .await
            .context("football-data.org request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("football-data.org error: {}", resp.status());
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse football-data.org response")?;

        Ok(parse_matches_response(&raw))
    }
}

pub(crate) fn parse_matches_response(raw: &Value) -> Vec<Fixture> {
    let matches = match raw["matches"].as_array() {
        Some(a) => a,
        None => return vec![],
    };

    matches
        .iter()
        .map(|m| Fixture {
            sport: Sport::Football,
            league: safe_str(&m["competition"]["name"]),
            home_team: safe_str(&m["homeTeam"]["name"]),
            away_team: safe_str(&m["awayTeam"]["name"]),
            kickoff_utc: parse_kickoff(&safe_str(&m["utcDate"])),
            ..Fixture::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_parse_matches() {
        let raw = json!({
            "matches": [
                {
                    "utcDate": "2025-04-08T15:00:00Z",
                    "competition": {"name": "Premier League"},
                    "homeTeam": {"name": "Liverpool"},
                    "awayTeam": {"name": "Everton"}
                },
                {
                    "utcDate": "2025-04-08T17:30:00Z",
                    "competition": {"name": "La Liga"},
                    "homeTeam": {"name": "Real Madrid"},
                    "awayTeam": {"name": "Barcelona"}
                }
            ]
        });
        let fixtures = parse_matches_response(&raw);
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].match_name(), "Liverpool vs Everton");
        assert_eq!(fixtures[1].league, "La Liga");
        // No form stats in this feed: documented defaults
        assert_relative_eq!(fixtures[0].home_avg_score, 0.0);
        assert_eq!(fixtures[0].home_streak, 0);
        assert_eq!(fixtures[0].importance, 1);
    }

    #[test]
    fn test_parse_missing_team_degrades_to_unknown() {
        let raw = json!({
            "matches": [{"utcDate": "2025-04-08T15:00:00Z", "homeTeam": {"name": "Ajax"}}]
        });
        let fixtures = parse_matches_response(&raw);
        assert_eq!(fixtures[0].away_team, "Unknown");
        assert_eq!(fixtures[0].league, "Unknown");
    }

    #[test]
    fn test_parse_non_list_payload() {
        assert!(parse_matches_response(&json!({"message": "forbidden"})).is_empty());
    }
}
