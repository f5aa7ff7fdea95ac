use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce::{parse_kickoff, safe_i64, safe_numeric, safe_str, UNKNOWN};

/// A generic store row: column name → JSON value.
pub type Row = Map<String, Value>;

/// Sports covered by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Football,
    Basketball,
    Baseball,
    Hockey,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Football => "football",
            Sport::Basketball => "basketball",
            Sport::Baseball => "baseball",
            Sport::Hockey => "hockey",
        }
    }

    /// Lenient name lookup; accepts common aliases from provider payloads.
    pub fn parse(s: &str) -> Option<Sport> {
        match s.trim().to_lowercase().as_str() {
            "football" | "soccer" => Some(Sport::Football),
            "basketball" | "nba" => Some(Sport::Basketball),
            "baseball" | "mlb" => Some(Sport::Baseball),
            "hockey" | "ice_hockey" | "ice hockey" | "nhl" => Some(Sport::Hockey),
            _ => None,
        }
    }

    pub fn all() -> [Sport; 4] {
        [
            Sport::Football,
            Sport::Basketball,
            Sport::Baseball,
            Sport::Hockey,
        ]
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled or completed match, normalized from any provider.
///
/// Natural key: `(sport, home_team, away_team, kickoff_utc)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub sport: Sport,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff_utc: DateTime<Utc>,
    /// Average goals/points scored recently, 0.0 when the source has none.
    pub home_avg_score: f64,
    pub away_avg_score: f64,
    /// Current win/loss streak (positive = winning run).
    pub home_streak: i64,
    pub away_streak: i64,
    pub weather_code: Option<i64>,
    /// Match importance weight (1 = routine fixture).
    pub importance: i64,
    /// Rolling form average over the last five results, 0.0 when unknown.
    pub home_form5: f64,
    pub away_form5: f64,
    pub lineup_available: bool,
    /// Opaque per-player statistics blob; only basketball providers send one.
    pub player_stats: Option<Value>,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture {
            sport: Sport::Football,
            league: UNKNOWN.to_string(),
            home_team: UNKNOWN.to_string(),
            away_team: UNKNOWN.to_string(),
            kickoff_utc: Utc::now(),
            home_avg_score: 0.0,
            away_avg_score: 0.0,
            home_streak: 0,
            away_streak: 0,
            weather_code: None,
            importance: 1,
            home_form5: 0.0,
            away_form5: 0.0,
            lineup_available: true,
            player_stats: None,
        }
    }
}

impl Fixture {
    /// Canonical display name, also the prediction key component.
    pub fn match_name(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    /// A fixture with an empty or placeholder team name is never persisted.
    pub fn is_persistable(&self) -> bool {
        let placeholder = |name: &str| {
            let n = name.trim();
            n.is_empty() || n.eq_ignore_ascii_case(UNKNOWN) || n.eq_ignore_ascii_case("Unknown Match")
        };
        !placeholder(&self.home_team) && !placeholder(&self.away_team)
    }

    /// Columns forming the fixture natural key.
    pub const KEY_COLUMNS: [&'static str; 4] =
        ["sport", "home_team", "away_team", "kickoff_utc"];

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("sport".into(), Value::from(self.sport.as_str()));
        row.insert("league".into(), Value::from(self.league.clone()));
        row.insert("home_team".into(), Value::from(self.home_team.clone()));
        row.insert("away_team".into(), Value::from(self.away_team.clone()));
        row.insert("kickoff_utc".into(), Value::from(self.kickoff_utc.to_rfc3339()));
        row.insert("home_avg_score".into(), Value::from(self.home_avg_score));
        row.insert("away_avg_score".into(), Value::from(self.away_avg_score));
        row.insert("home_streak".into(), Value::from(self.home_streak));
        row.insert("away_streak".into(), Value::from(self.away_streak));
        row.insert(
            "weather_code".into(),
            self.weather_code.map(Value::from).unwrap_or(Value::Null),
        );
        row.insert("importance".into(), Value::from(self.importance));
        row.insert("home_form5".into(), Value::from(self.home_form5));
        row.insert("away_form5".into(), Value::from(self.away_form5));
        row.insert(
            "lineup_available".into(),
            Value::from(self.lineup_available as i64),
        );
        row.insert(
            "player_stats".into(),
            match &self.player_stats {
                Some(v) => Value::from(v.to_string()),
                None => Value::Null,
            },
        );
        row
    }

    /// Rebuild a fixture from a stored row, degrading field-by-field rather
    /// than failing the record.
    pub fn from_row(row: &Row) -> Fixture {
        let get = |col: &str| row.get(col).cloned().unwrap_or(Value::Null);
        Fixture {
            sport: Sport::parse(&safe_str(&get("sport"))).unwrap_or(Sport::Football),
            league: safe_str(&get("league")),
            home_team: safe_str(&get("home_team")),
            away_team: safe_str(&get("away_team")),
            kickoff_utc: parse_kickoff(&safe_str(&get("kickoff_utc"))),
            home_avg_score: safe_numeric(&get("home_avg_score")),
            away_avg_score: safe_numeric(&get("away_avg_score")),
            home_streak: safe_i64(&get("home_streak")),
            away_streak: safe_i64(&get("away_streak")),
            weather_code: match get("weather_code") {
                Value::Null => None,
                v => Some(safe_i64(&v)),
            },
            importance: safe_i64(&get("importance")),
            home_form5: safe_numeric(&get("home_form5")),
            away_form5: safe_numeric(&get("away_form5")),
            lineup_available: safe_i64(&get("lineup_available")) != 0,
            player_stats: match get("player_stats") {
                Value::String(s) => serde_json::from_str(&s).ok(),
                Value::Null => None,
                v => Some(v),
            },
        }
    }
}

/// Names that must never become a League row.
pub fn is_league_sentinel(name: &str) -> bool {
    let n = name.trim();
    // "Desconocida" is the legacy Spanish-feed default for the same thing
    n.is_empty() || n.eq_ignore_ascii_case("unknown") || n.eq_ignore_ascii_case("desconocida")
}

/// A league grouping, created lazily on first sight and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub logo_url: Option<String>,
}

/// Forecast outcome labels. Class indexes match the classifier's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::HomeWin, Outcome::Draw, Outcome::AwayWin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::HomeWin => "Home win",
            Outcome::Draw => "Draw",
            Outcome::AwayWin => "Away win",
        }
    }

    pub fn from_class(index: usize) -> Outcome {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn parse(s: &str) -> Option<Outcome> {
        Self::ALL.iter().copied().find(|o| o.as_str() == s)
    }
}

/// The classifier's output for one fixture.
///
/// Natural key: `(sport, match_name, kickoff_utc)`. The two secondary
/// markets are fixed placeholder text with fixed placeholder confidence;
/// they are NOT model outputs and carry no statistical meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub sport: Sport,
    pub league: String,
    pub match_name: String,
    pub kickoff_utc: DateTime<Utc>,
    pub forecast: Outcome,
    pub confidence: f64,
    pub market_2: String,
    pub confidence_2: f64,
    pub market_3: String,
    pub confidence_3: f64,
}

impl Prediction {
    /// Columns forming the prediction natural key.
    pub const KEY_COLUMNS: [&'static str; 3] = ["sport", "match_name", "kickoff_utc"];

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("sport".into(), Value::from(self.sport.as_str()));
        row.insert("league".into(), Value::from(self.league.clone()));
        row.insert("match_name".into(), Value::from(self.match_name.clone()));
        row.insert("kickoff_utc".into(), Value::from(self.kickoff_utc.to_rfc3339()));
        row.insert("forecast".into(), Value::from(self.forecast.as_str()));
        row.insert("confidence".into(), Value::from(self.confidence));
        row.insert("market_2".into(), Value::from(self.market_2.clone()));
        row.insert("confidence_2".into(), Value::from(self.confidence_2));
        row.insert("market_3".into(), Value::from(self.market_3.clone()));
        row.insert("confidence_3".into(), Value::from(self.confidence_3));
        row
    }
}
