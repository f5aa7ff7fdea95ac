//! League registry: get-or-create by display name.
//!
//! Leagues are created lazily the first time a new name is observed and are
//! never updated or deleted here. A duplicate-name race is resolved by the
//! UNIQUE constraint on `leagues.name`: an insert conflict is treated as
//! "already exists" and answered with a second lookup.

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::retry::{retry, RetryPolicy};
use crate::store::models::{is_league_sentinel, Row};
use crate::store::{Filter, StoreError, TabularStore};

pub struct LeagueRegistry {
    store: Arc<dyn TabularStore>,
    policy: RetryPolicy,
}

impl LeagueRegistry {
    pub fn new(store: Arc<dyn TabularStore>, policy: RetryPolicy) -> Self {
        LeagueRegistry { store, policy }
    }

    /// Return the id for `name`, creating the league on first sight.
    /// Sentinel names ("unknown" and friends) are never inserted and yield
    /// `None`.
    pub async fn get_or_create(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let name = name.trim();
        if is_league_sentinel(name) {
            return Ok(None);
        }

        if let Some(id) = self.lookup(name).await? {
            return Ok(Some(id));
        }

        let mut record = Row::new();
        record.insert("name".into(), Value::from(name));
        record.insert("country".into(), Value::Null);
        record.insert("logo_url".into(), Value::Null);

        let inserted = retry(&self.policy, "league_insert", StoreError::is_transient, || {
            self.store.insert("leagues", record.clone())
        })
        .await;
        match inserted {
            Ok(()) => debug!("created league {:?}", name),
            // Someone else created it between lookup and insert
            Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }

        self.lookup(name).await
    }

    async fn lookup(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let filters = [Filter::eq("name", name)];
        let rows = retry(&self.policy, "league_select", StoreError::is_transient, || {
            self.store.select_where("leagues", &filters)
        })
        .await?;
        Ok(rows.first().and_then(|row| row.get("id")).and_then(Value::as_i64))
    }
}
