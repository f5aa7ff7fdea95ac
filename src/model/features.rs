//! Fixed-width numeric feature row for the classifier.

use crate::store::models::Fixture;

/// Ordered feature vector built from one fixture. Field order is part of the
/// model contract and must match between training and inference.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub values: [f64; FeatureRow::WIDTH],
}

impl FeatureRow {
    pub const WIDTH: usize = 9;

    /// Column order:
    /// `[home_avg, away_avg, home_streak, away_streak, weather, importance,
    ///   home_form5, away_form5, lineup_available]`
    pub fn from_fixture(fixture: &Fixture) -> FeatureRow {
        FeatureRow {
            values: [
                sanitize(fixture.home_avg_score),
                sanitize(fixture.away_avg_score),
                fixture.home_streak as f64,
                fixture.away_streak as f64,
                fixture.weather_code.unwrap_or(0) as f64,
                fixture.importance as f64,
                sanitize(fixture.home_form5),
                sanitize(fixture.away_form5),
                fixture.lineup_available as i64 as f64,
            ],
        }
    }
}

/// Non-finite values (NaN, ±inf from bad upstream arithmetic) become 0.0 so
/// they can never poison a gradient.
fn sanitize(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
