//! Idempotent store writer.
//!
//! Upserts are manual: select on the natural-key columns, then update in
//! place or insert. The check-then-act pair is not atomic, which is fine for
//! this single-instance sequential pipeline; a concurrent deployment must
//! replace it with the store's own atomic conditional upsert.

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

use crate::coerce::parse_kickoff;
use crate::retry::{retry, RetryPolicy};
use crate::store::models::{Fixture, Prediction, Row};
use crate::store::{Filter, StoreError, TabularStore};

/// Result of one upsert attempt. `Failed` is a terminal per-record state,
/// never an error: the batch always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Failed,
}

/// Columns whose string values are re-parsed as timestamps immediately
/// before write.
const TIMESTAMP_COLUMNS: [&str; 1] = ["kickoff_utc"];

pub struct StoreWriter {
    store: Arc<dyn TabularStore>,
    policy: RetryPolicy,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn TabularStore>, policy: RetryPolicy) -> Self {
        StoreWriter { store, policy }
    }

    /// Upsert `record` into `table` keyed on `key_columns`.
    pub async fn upsert(
        &self,
        table: &str,
        mut record: Row,
        key_columns: &[&str],
    ) -> UpsertOutcome {
        normalize_timestamps(&mut record);

        let mut filters = Vec::with_capacity(key_columns.len());
        for col in key_columns {
            match record.get(*col) {
                Some(value) => filters.push(Filter::eq(*col, value.clone())),
                None => {
                    error!("record for {} missing key column {:?}", table, col);
                    return UpsertOutcome::Failed;
                }
            }
        }

        let existing = self
            .with_retry("select", || self.store.select_where(table, &filters))
            .await;
        let existing = match existing {
            Ok(rows) => rows,
            Err(e) => {
                error!("upsert into {} failed at lookup: {}", table, e);
                return UpsertOutcome::Failed;
            }
        };

        if existing.is_empty() {
            match self
                .with_retry("insert", || self.store.insert(table, record.clone()))
                .await
            {
                Ok(()) => UpsertOutcome::Inserted,
                // A concurrent writer won the key between check and act;
                // fall through to an update of the now-existing row.
                Err(StoreError::Conflict(_)) => self.update(table, &filters, record).await,
                Err(e) => {
                    error!("upsert into {} failed at insert: {}", table, e);
                    UpsertOutcome::Failed
                }
            }
        } else {
            self.update(table, &filters, record).await
        }
    }

    async fn update(&self, table: &str, filters: &[Filter], record: Row) -> UpsertOutcome {
        match self
            .with_retry("update", || {
                self.store.update_where(table, filters, record.clone())
            })
            .await
        {
            Ok(_) => UpsertOutcome::Updated,
            Err(e) => {
                error!("upsert into {} failed at update: {}", table, e);
                UpsertOutcome::Failed
            }
        }
    }

    async fn with_retry<T, Fut, F>(&self, op: &str, operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        retry(&self.policy, op, StoreError::is_transient, operation).await
    }

    /// Persist one fixture on its natural key. Returns `None` (and writes
    /// nothing) for placeholder fixtures.
    pub async fn write_fixture(&self, fixture: &Fixture) -> Option<UpsertOutcome> {
        if !fixture.is_persistable() {
            warn!(
                "skipping non-persistable fixture {:?}",
                fixture.match_name()
            );
            return None;
        }
        Some(
            self.upsert("fixtures", fixture.to_row(), &Fixture::KEY_COLUMNS)
                .await,
        )
    }

    /// Persist one prediction on its natural key.
    pub async fn write_prediction(&self, prediction: &Prediction) -> UpsertOutcome {
        self.upsert("predictions", prediction.to_row(), &Prediction::KEY_COLUMNS)
            .await
    }
}

/// Re-parse string timestamps in designated columns; unparsable values are
/// replaced with "now" rather than aborting the write.
fn normalize_timestamps(record: &mut Row) {
    for col in TIMESTAMP_COLUMNS {
        let normalized = match record.get(col) {
            Some(Value::String(raw)) => parse_kickoff(raw).to_rfc3339(),
            _ => continue,
        };
        record.insert(col.to_string(), Value::from(normalized));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn writer(store: Arc<dyn TabularStore>) -> StoreWriter {
        StoreWriter::new(store, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    fn sample_fixture() -> Fixture {
        Fixture {
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            league: "Premier League".into(),
            home_avg_score: 1.8,
            away_avg_score: 1.2,
            home_streak: 4,
            away_streak: 2,
            weather_code: Some(1),
            importance: 3,
            ..Fixture::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let w = writer(store.clone());
        let fixture = sample_fixture();

        assert_eq!(w.write_fixture(&fixture).await, Some(UpsertOutcome::Inserted));
        assert_eq!(w.write_fixture(&fixture).await, Some(UpsertOutcome::Updated));

        let rows = store.select_where("fixtures", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_fixture_never_written() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let w = writer(store.clone());

        let mut fixture = sample_fixture();
        fixture.away_team = "Unknown".into();
        assert_eq!(w.write_fixture(&fixture).await, None);
        fixture.away_team = String::new();
        assert_eq!(w.write_fixture(&fixture).await, None);

        let rows = store.select_where("fixtures", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_timestamp_normalized_before_write() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let w = writer(store.clone());

        let mut record = sample_fixture().to_row();
        record.insert("kickoff_utc".into(), json!("2025-04-08 15:00"));
        let outcome = w
            .upsert("fixtures", record, &Fixture::KEY_COLUMNS)
            .await;
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let rows = store.select_where("fixtures", &[]).await.unwrap();
        assert_eq!(rows[0]["kickoff_utc"], json!("2025-04-08T15:00:00+00:00"));
    }

    /// Store wrapper that reports `Unavailable` for the first N calls.
    struct FlakyStore {
        inner: SqliteStore,
        failures_left: AtomicU32,
    }

    impl FlakyStore {
        fn trip(&self) -> Result<(), StoreError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                Err(StoreError::Unavailable("simulated outage".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl TabularStore for FlakyStore {
        async fn select_where(
            &self,
            table: &str,
            filters: &[Filter],
        ) -> Result<Vec<Row>, StoreError> {
            self.trip()?;
            self.inner.select_where(table, filters).await
        }

        async fn insert(&self, table: &str, record: Row) -> Result<(), StoreError> {
            self.trip()?;
            self.inner.insert(table, record).await
        }

        async fn update_where(
            &self,
            table: &str,
            filters: &[Filter],
            fields: Row,
        ) -> Result<u64, StoreError> {
            self.trip()?;
            self.inner.update_where(table, filters, fields).await
        }
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let flaky = Arc::new(FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            failures_left: AtomicU32::new(2),
        });
        let w = writer(flaky.clone());

        let outcome = w.write_fixture(&sample_fixture()).await;
        assert_eq!(outcome, Some(UpsertOutcome::Inserted));
    }

    #[tokio::test]
    async fn test_persistent_failure_marks_record_failed() {
        let flaky = Arc::new(FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            failures_left: AtomicU32::new(u32::MAX),
        });
        let w = writer(flaky.clone());

        let outcome = w.write_fixture(&sample_fixture()).await;
        assert_eq!(outcome, Some(UpsertOutcome::Failed));
    }
}
