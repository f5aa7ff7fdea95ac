//! API-Sports family adapters (shared envelope, per-sport hosts).
//!
//! Auth: `x-apisports-key` header. Responses wrap the payload in a
//! `response` array; each element nests teams, schedule and optional form
//! statistics. Missing or wrong-typed fields degrade to defaults; a
//! malformed record never aborts the fetch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::coerce::{parse_kickoff, safe_i64, safe_numeric, safe_str};
use crate::providers::ProviderAdapter;
use crate::store::models::{Fixture, Sport};

fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}

fn envelope(raw: &Value) -> &[Value] {
    raw["response"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Football fixtures from API-Football (v3).
pub struct ApiFootball {
    http: Client,
    api_key: String,
    base_url: String,
}

impl ApiFootball {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        Ok(ApiFootball {
            http: build_client()?,
            api_key: api_key.unwrap_or_default().to_string(),
            base_url: base_url
                .unwrap_or("https://v3.football.api-sports.io")
                .to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ApiFootball {
    fn name(&self) -> &str {
        "API-Football"
    }

    fn sport(&self) -> Sport {
        Sport::Football
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        let url = format!("{}/fixtures?date={}", self.base_url, date.format("%Y-%m-%d"));
        debug!("Fetching football fixtures from {}", url);

        let resp = self
            .http
            .get(&url)
            .header("x-apisports-key", &self.api_key)
            .send()
            .await
            .context("API-Football request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("API-Football error: {}", resp.status());
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse API-Football response")?;

        Ok(parse_football_response(&raw))
    }
}

pub(crate) fn parse_football_response(raw: &Value) -> Vec<Fixture> {
    envelope(raw)
        .iter()
        .map(|item| {
            let form = &item["form"];
            Fixture {
                sport: Sport::Football,
                league: safe_str(&item["league"]["name"]),
                home_team: safe_str(&item["teams"]["home"]["name"]),
                away_team: safe_str(&item["teams"]["away"]["name"]),
                kickoff_utc: parse_kickoff(&safe_str(&item["fixture"]["date"])),
                home_avg_score: safe_numeric(&form["home"]["avg_goals"]),
                away_avg_score: safe_numeric(&form["away"]["avg_goals"]),
                home_streak: safe_i64(&form["home"]["streak"]),
                away_streak: safe_i64(&form["away"]["streak"]),
                weather_code: match &item["fixture"]["weather_code"] {
                    Value::Null => None,
                    v => Some(safe_i64(v)),
                },
                importance: match &item["fixture"]["importance"] {
                    Value::Null => 1,
                    v => safe_i64(v).max(1),
                },
                home_form5: safe_numeric(&form["home"]["last5_avg"]),
                away_form5: safe_numeric(&form["away"]["last5_avg"]),
                lineup_available: !item["lineups"].is_null(),
                player_stats: None,
            }
        })
        .collect()
}

/// Basketball games from API-Basketball (v1). The only adapter that carries
/// the opaque per-player statistics blob through to the fixture.
pub struct ApiBasketball {
    http: Client,
    api_key: String,
    base_url: String,
}

impl ApiBasketball {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        Ok(ApiBasketball {
            http: build_client()?,
            api_key: api_key.unwrap_or_default().to_string(),
            base_url: base_url
                .unwrap_or("https://v1.basketball.api-sports.io")
                .to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ApiBasketball {
    fn name(&self) -> &str {
        "API-Basketball"
    }

    fn sport(&self) -> Sport {
        Sport::Basketball
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        let url = format!("{}/games?date={}", self.base_url, date.format("%Y-%m-%d"));
        debug!("Fetching basketball games from {}", url);

        let resp = self
            .http
            .get(&url)
            .header("x-apisports-key", &self.api_key)
            .send()
            .await
            .context("API-Basketball request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("API-Basketball error: {}", resp.status());
        }

        let raw: Value = resp
            .json()
            .await
            .context("Failed to parse API-Basketball response")?;

        Ok(parse_basketball_response(&raw))
    }
}

pub(crate) fn parse_basketball_response(raw: &Value) -> Vec<Fixture> {
    envelope(raw)
        .iter()
        .map(|item| Fixture {
            sport: Sport::Basketball,
            league: safe_str(&item["league"]["name"]),
            home_team: safe_str(&item["teams"]["home"]["name"]),
            away_team: safe_str(&item["teams"]["away"]["name"]),
            kickoff_utc: parse_kickoff(&safe_str(&item["date"])),
            home_avg_score: safe_numeric(&item["averages"]["home"]["points"]),
            away_avg_score: safe_numeric(&item["averages"]["away"]["points"]),
            home_streak: safe_i64(&item["averages"]["home"]["streak"]),
            away_streak: safe_i64(&item["averages"]["away"]["streak"]),
            // Indoor sport: no weather signal in this feed
            weather_code: None,
            importance: match &item["importance"] {
                Value::Null => 1,
                v => safe_i64(v).max(1),
            },
            home_form5: safe_numeric(&item["averages"]["home"]["last5"]),
            away_form5: safe_numeric(&item["averages"]["away"]["last5"]),
            lineup_available: !item["players"].is_null(),
            player_stats: match &item["players"] {
                Value::Null => None,
                v => Some(v.clone()),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_parse_football_full_record() {
        let raw = json!({
            "response": [{
                "fixture": {
                    "date": "2025-04-08T15:00:00+02:00",
                    "weather_code": 1,
                    "importance": 3
                },
                "league": {"name": "Premier League"},
                "teams": {
                    "home": {"name": "Arsenal"},
                    "away": {"name": "Chelsea"}
                },
                "form": {
                    "home": {"avg_goals": 1.8, "streak": 4, "last5_avg": 2.0},
                    "away": {"avg_goals": "1.2", "streak": 2, "last5_avg": 0.8}
                },
                "lineups": [{"team": "Arsenal"}]
            }]
        });
        let fixtures = parse_football_response(&raw);
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.match_name(), "Arsenal vs Chelsea");
        assert_eq!(f.league, "Premier League");
        assert_eq!(f.kickoff_utc.to_rfc3339(), "2025-04-08T13:00:00+00:00");
        assert_relative_eq!(f.home_avg_score, 1.8);
        assert_relative_eq!(f.away_avg_score, 1.2); // numeric string coerced
        assert_eq!(f.home_streak, 4);
        assert_eq!(f.weather_code, Some(1));
        assert_eq!(f.importance, 3);
        assert!(f.lineup_available);
    }

    #[test]
    fn test_parse_football_malformed_fields_degrade() {
        let raw = json!({
            "response": [{
                "fixture": {"date": "not a date"},
                "teams": {"home": {"name": "Arsenal"}},
                "form": {"home": {"avg_goals": {"nested": true}, "streak": null}}
            }]
        });
        let fixtures = parse_football_response(&raw);
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.away_team, "Unknown");
        assert_eq!(f.league, "Unknown");
        assert_relative_eq!(f.home_avg_score, 0.0);
        assert_eq!(f.home_streak, 0);
        assert_eq!(f.weather_code, None);
        assert_eq!(f.importance, 1);
    }

    #[test]
    fn test_parse_football_missing_envelope() {
        assert!(parse_football_response(&json!({"errors": ["rate limit"]})).is_empty());
    }

    #[test]
    fn test_parse_basketball_carries_player_blob() {
        let raw = json!({
            "response": [{
                "date": "2025-04-08 19:30",
                "league": {"name": "NBA"},
                "teams": {
                    "home": {"name": "Lakers"},
                    "away": {"name": "Celtics"}
                },
                "averages": {
                    "home": {"points": 111.5, "streak": 3, "last5": 108.0},
                    "away": {"points": 109.0, "streak": -1, "last5": 112.4}
                },
                "players": {"Lakers": [{"name": "James", "ppg": 27.1}]}
            }]
        });
        let fixtures = parse_basketball_response(&raw);
        assert_eq!(fixtures.len(), 1);
        let f = &fixtures[0];
        assert_eq!(f.sport, Sport::Basketball);
        assert_relative_eq!(f.home_avg_score, 111.5);
        assert_eq!(f.away_streak, -1);
        assert_eq!(f.weather_code, None);
        assert!(f.player_stats.is_some());
    }

    #[test]
    fn test_parse_basketball_without_players() {
        let raw = json!({
            "response": [{
                "date": "2025-04-08 19:30",
                "teams": {"home": {"name": "Bulls"}, "away": {"name": "Heat"}}
            }]
        });
        let f = &parse_basketball_response(&raw)[0];
        assert_eq!(f.player_stats, None);
        assert!(!f.lineup_available);
    }
}
