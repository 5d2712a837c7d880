//! Records exchanged with the persistence service
//!
//! A record is an immutable JSON payload filed under a scope and a key.
//! Records are append-only; "updates" append a newer record for the same
//! key and readers take the most recent one.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use ulid::Ulid;

/// Logical partition of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Dedup claims
    ActionLedger,
    /// Golden test attempt results
    ExecutionResults,
    /// Flaky status per golden test
    FlakyState,
    /// Kill switch decisions and clears
    KillSwitch,
    /// Coverage snapshots and warnings
    Coverage,
}

impl Scope {
    /// Snake-case name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::ActionLedger => "action_ledger",
            Scope::ExecutionResults => "execution_results",
            Scope::FlakyState => "flaky_state",
            Scope::KillSwitch => "kill_switch",
            Scope::Coverage => "coverage",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record identifier (ULID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Ulid);

impl RecordId {
    /// Generate new record ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique id
    pub id: RecordId,
    /// Partition
    pub scope: Scope,
    /// Lookup key within the scope
    pub key: String,
    /// When the record was written (caller clock)
    pub recorded_at: DateTime<Utc>,
    /// Optional expiry; expired records are invisible to conditional writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// JSON payload
    pub payload: serde_json::Value,
}

impl Record {
    /// Build a record from any serializable payload
    ///
    /// # Errors
    /// `StoreError::Serialization` if the payload cannot be encoded
    pub fn new<T: Serialize + ?Sized>(
        scope: Scope,
        key: impl Into<String>,
        recorded_at: DateTime<Utc>,
        payload: &T,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            id: RecordId::new(),
            scope,
            key: key.into(),
            recorded_at,
            expires_at: None,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// With expiry time
    #[inline]
    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the record is still live at `at`
    #[inline]
    #[must_use]
    pub fn is_live(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expiry| expiry > at)
    }

    /// Decode the payload
    ///
    /// # Errors
    /// `StoreError::Serialization` if the payload has the wrong shape
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Top-level payload field
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload.get(name)
    }
}

/// Filter for `RecordStore::query`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Exact key match
    pub key: Option<String>,
    /// Top-level payload fields that must be equal
    pub fields: Vec<(String, serde_json::Value)>,
    /// Only records written at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of records returned
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Match everything in the scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a key
    #[inline]
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Require a payload field value
    #[inline]
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Restrict to a time window
    #[inline]
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Cap the result size
    #[inline]
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check a record against the filter
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(key) = &self.key {
            if &record.key != key {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.recorded_at < since {
                return false;
            }
        }
        self.fields
            .iter()
            .all(|(name, value)| record.field(name) == Some(value))
    }
}

/// Result of a conditional write
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// No live record existed; ours was written
    Inserted(RecordId),
    /// A live record with the same key already exists
    Existing(Record),
}

impl InsertOutcome {
    /// Whether our record was written
    #[inline]
    #[must_use]
    pub fn inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// In-memory record index shared by the store implementations
///
/// Records are kept in append order per scope; queries walk newest first.
#[derive(Debug, Default)]
pub(crate) struct RecordLog {
    scopes: HashMap<Scope, Vec<Record>>,
}

impl RecordLog {
    pub(crate) fn push(&mut self, record: Record) -> RecordId {
        let id = record.id;
        self.scopes.entry(record.scope).or_default().push(record);
        id
    }

    /// Most recent record for `key` that is live at `at`
    pub(crate) fn live_entry(&self, scope: Scope, key: &str, at: DateTime<Utc>) -> Option<&Record> {
        self.scopes
            .get(&scope)?
            .iter()
            .rev()
            .find(|r| r.key == key && r.is_live(at))
    }

    pub(crate) fn query(&self, scope: Scope, query: &RecordQuery) -> Vec<Record> {
        let Some(records) = self.scopes.get(&scope) else {
            return Vec::new();
        };
        let matching = records.iter().rev().filter(|r| query.matches(r)).cloned();
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    /// Drop expired records, returning how many were removed
    pub(crate) fn purge_expired(&mut self, scope: Scope, now: DateTime<Utc>) -> usize {
        let Some(records) = self.scopes.get_mut(&scope) else {
            return 0;
        };
        let before = records.len();
        records.retain(|r| r.is_live(now));
        before - records.len()
    }

    pub(crate) fn all(&self) -> impl Iterator<Item = &Record> {
        self.scopes.values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn record(key: &str, at: DateTime<Utc>, payload: serde_json::Value) -> Record {
        Record::new(Scope::ExecutionResults, key, at, &payload).unwrap()
    }

    #[test]
    fn query_matches_key_fields_and_window() {
        let now = Utc::now();
        let r = record("t-1", now, json!({"severity": "high", "failed": true}));

        assert!(RecordQuery::new().matches(&r));
        assert!(RecordQuery::new().key("t-1").matches(&r));
        assert!(!RecordQuery::new().key("t-2").matches(&r));
        assert!(RecordQuery::new().field("severity", "high").matches(&r));
        assert!(!RecordQuery::new().field("failed", false).matches(&r));
        assert!(RecordQuery::new().since(now - Duration::minutes(1)).matches(&r));
        assert!(!RecordQuery::new().since(now + Duration::seconds(1)).matches(&r));
    }

    #[test]
    fn log_returns_newest_first_with_limit() {
        let now = Utc::now();
        let mut log = RecordLog::default();
        for i in 0..5 {
            log.push(record("k", now + Duration::seconds(i), json!({ "i": i })));
        }

        let newest = log.query(Scope::ExecutionResults, &RecordQuery::new().limit(2));
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].field("i"), Some(&json!(4)));
        assert_eq!(newest[1].field("i"), Some(&json!(3)));
        assert!(log.query(Scope::Coverage, &RecordQuery::new()).is_empty());
    }

    #[test]
    fn expiry_hides_entries_and_purges() {
        let now = Utc::now();
        let mut log = RecordLog::default();
        log.push(record("k", now, json!({})).expiring_at(now + Duration::hours(1)));

        assert!(log.live_entry(Scope::ExecutionResults, "k", now).is_some());
        assert!(log
            .live_entry(Scope::ExecutionResults, "k", now + Duration::hours(2))
            .is_none());

        assert_eq!(log.purge_expired(Scope::ExecutionResults, now), 0);
        assert_eq!(
            log.purge_expired(Scope::ExecutionResults, now + Duration::hours(1)),
            1
        );
    }

    #[test]
    fn decode_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Payload {
            n: u32,
        }
        let r = record("k", Utc::now(), json!({"n": 7}));
        assert_eq!(r.decode::<Payload>().unwrap(), Payload { n: 7 });
        assert!(r.decode::<Vec<u8>>().is_err());
    }
}
