//! The persistence service contract and its in-memory implementation

use crate::error::StoreError;
use crate::record::{InsertOutcome, Record, RecordId, RecordLog, RecordQuery, Scope};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;

/// Durable append/query service
///
/// Implementations must be durable across process restarts (the in-memory
/// store models this by being shared through an `Arc`) and must make
/// `insert_if_absent` a single atomic conditional write.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Append a record unconditionally
    async fn append(&self, record: Record) -> Result<RecordId, StoreError>;

    /// Write `record` unless a record with the same scope and key is live
    /// at `record.recorded_at`
    ///
    /// The existence check and the write are one atomic step; there is
    /// deliberately no separate "exists" call on this trait.
    async fn insert_if_absent(&self, record: Record) -> Result<InsertOutcome, StoreError>;

    /// Records of `scope` matching `query`, most recently written first
    async fn query(&self, scope: Scope, query: &RecordQuery) -> Result<Vec<Record>, StoreError>;

    /// Remove records of `scope` that expired at or before `now`
    async fn purge_expired(&self, scope: Scope, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Process-local store
///
/// Share one instance through `Arc<dyn RecordStore>` to let several engine
/// instances (or a "restarted" one) see the same history.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: Mutex<RecordLog>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across all scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().all().count()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, record: Record) -> Result<RecordId, StoreError> {
        Ok(self.log.lock().push(record))
    }

    async fn insert_if_absent(&self, record: Record) -> Result<InsertOutcome, StoreError> {
        let mut log = self.log.lock();
        if let Some(existing) = log.live_entry(record.scope, &record.key, record.recorded_at) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        Ok(InsertOutcome::Inserted(log.push(record)))
    }

    async fn query(&self, scope: Scope, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        Ok(self.log.lock().query(scope, query))
    }

    async fn purge_expired(&self, scope: Scope, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.log.lock().purge_expired(scope, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Arc;

    fn claim(key: &str, at: DateTime<Utc>) -> Record {
        Record::new(Scope::ActionLedger, key, at, &json!({"key": key}))
            .unwrap()
            .expiring_at(at + Duration::hours(24))
    }

    #[tokio::test]
    async fn insert_if_absent_is_first_writer_wins() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = store.insert_if_absent(claim("k", now)).await.unwrap();
        assert!(first.inserted());

        let second = store.insert_if_absent(claim("k", now)).await.unwrap();
        match second {
            InsertOutcome::Existing(existing) => assert_eq!(existing.key, "k"),
            InsertOutcome::Inserted(_) => panic!("second claim must see the first"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_entry_allows_new_claim() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_if_absent(claim("k", now)).await.unwrap();

        let later = now + Duration::hours(25);
        assert!(store.insert_if_absent(claim("k", later)).await.unwrap().inserted());
        assert_eq!(store.purge_expired(Scope::ActionLedger, later).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_conditional_writes_admit_one() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_if_absent(claim("race", now)).await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().inserted() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_if_absent(claim("k", now)).await.unwrap();

        let other = Record::new(Scope::Coverage, "k", now, &json!({})).unwrap();
        assert!(store.insert_if_absent(other).await.unwrap().inserted());
        assert_eq!(
            store
                .query(Scope::Coverage, &RecordQuery::new())
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
