//! At-most-once action ledger
//!
//! `claim` is the only way to ask "is this new?". It is answered by one
//! conditional write against the durable store, so racing callers, other
//! orchestrator instances and a restarted process all agree on a single
//! winner per key until the TTL elapses.

use crate::error::LedgerError;
use aegis_boundary::{InsertOutcome, Record, RecordQuery, RecordStore, Scope};
use aegis_types::{Clock, ValidationError};
use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Longest TTL accepted (ten years)
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Ledger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How long a claim blocks duplicates
    pub ttl_secs: u64,
    /// Interval of the background purge
    pub cleanup_interval_secs: u64,
    /// Entries kept in the read-through cache
    pub cache_capacity: u64,
}

impl LedgerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With TTL
    #[inline]
    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// With cleanup interval
    #[inline]
    #[must_use]
    pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    /// Zero or excessive TTL, zero cleanup interval
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ttl_secs == 0 || self.ttl_secs > MAX_TTL_SECS {
            return Err(ValidationError::InvalidConfig(format!(
                "ledger ttl_secs must be in 1..={MAX_TTL_SECS}, got {}",
                self.ttl_secs
            )));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ValidationError::InvalidConfig(
                "ledger cleanup_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// TTL as a chrono duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::seconds(i64::try_from(self.ttl_secs.min(MAX_TTL_SECS)).unwrap_or(i64::MAX))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            cleanup_interval_secs: 60 * 60,
            cache_capacity: 10_000,
        }
    }
}

/// Dedup entry as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Caller-supplied key
    pub dedupe_key: String,
    /// When the winning claim was made
    pub first_seen: DateTime<Utc>,
    /// SHA-256 (hex) of the claimed payload
    pub digest: String,
    /// When the claim stops blocking duplicates
    pub expires_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Whether the claim still blocks duplicates at `now`
    #[inline]
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Result of a claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller won the key
    Accepted(ActionRecord),
    /// Someone else holds the key; carries their record
    Duplicate(ActionRecord),
}

impl ClaimOutcome {
    /// Whether the caller may proceed
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The record governing the key
    #[inline]
    #[must_use]
    pub fn into_record(self) -> ActionRecord {
        match self {
            Self::Accepted(record) | Self::Duplicate(record) => record,
        }
    }
}

/// SHA-256 hex digest of the JSON encoding of `payload`
///
/// # Errors
/// Payload not serializable
pub fn payload_digest<P: Serialize + ?Sized>(payload: &P) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Crash-recoverable dedup store
#[derive(Debug)]
pub struct ActionLedger {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
    /// Claims confirmed by the store; only ever consulted for "duplicate"
    confirmed: Cache<String, ActionRecord>,
}

impl ActionLedger {
    /// Create ledger over a durable store
    ///
    /// # Errors
    /// Invalid configuration
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        config: LedgerConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        let confirmed = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(std::time::Duration::from_secs(config.ttl_secs))
            .build();
        Ok(Self {
            store,
            clock,
            config,
            confirmed,
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Atomically claim `dedupe_key`
    ///
    /// Exactly one caller per key and TTL window receives `Accepted`.
    ///
    /// # Errors
    /// - `LedgerError::Validation` for a blank key
    /// - `LedgerError::Persistence` when the store fails; the claim fails
    ///   closed and the action must not proceed
    pub async fn claim<P: Serialize + ?Sized>(
        &self,
        dedupe_key: &str,
        payload: &P,
    ) -> Result<ClaimOutcome, LedgerError> {
        ValidationError::ensure_non_empty("dedupe_key", dedupe_key)?;
        let now = self.clock.now();

        if let Some(known) = self.confirmed.get(dedupe_key).await {
            if known.is_live(now) {
                tracing::debug!("Duplicate claim for {} served from cache", dedupe_key);
                return Ok(ClaimOutcome::Duplicate(known));
            }
            self.confirmed.invalidate(dedupe_key).await;
        }

        let candidate = ActionRecord {
            dedupe_key: dedupe_key.to_string(),
            first_seen: now,
            digest: payload_digest(payload)?,
            expires_at: now + self.config.ttl(),
        };
        let record = Record::new(Scope::ActionLedger, dedupe_key, now, &candidate)?
            .expiring_at(candidate.expires_at);

        match self.store.insert_if_absent(record).await {
            Ok(InsertOutcome::Inserted(_)) => {
                tracing::info!("Claimed action {}", dedupe_key);
                self.confirmed
                    .insert(dedupe_key.to_string(), candidate.clone())
                    .await;
                Ok(ClaimOutcome::Accepted(candidate))
            }
            Ok(InsertOutcome::Existing(existing)) => {
                let winner: ActionRecord = existing.decode()?;
                tracing::warn!(
                    "Rejected duplicate action {} (first seen {})",
                    dedupe_key,
                    winner.first_seen
                );
                self.confirmed
                    .insert(dedupe_key.to_string(), winner.clone())
                    .await;
                Ok(ClaimOutcome::Duplicate(winner))
            }
            Err(e) => {
                tracing::error!("Claim for {} failed closed: {}", dedupe_key, e);
                Err(LedgerError::Persistence(e))
            }
        }
    }

    /// Claim, turning a duplicate into `LedgerError::Duplicate`
    ///
    /// # Errors
    /// As `claim`, plus `LedgerError::Duplicate`
    pub async fn claim_or_reject<P: Serialize + ?Sized>(
        &self,
        dedupe_key: &str,
        payload: &P,
    ) -> Result<ActionRecord, LedgerError> {
        match self.claim(dedupe_key, payload).await? {
            ClaimOutcome::Accepted(record) => Ok(record),
            ClaimOutcome::Duplicate(record) => Err(LedgerError::Duplicate {
                key: record.dedupe_key,
                first_seen: record.first_seen,
            }),
        }
    }

    /// Live record for `dedupe_key`, for audit views
    ///
    /// Not a duplicate check: the answer may be stale by the time it is
    /// used. Gate decisions go through `claim`.
    ///
    /// # Errors
    /// Store failure or undecodable record
    pub async fn lookup(&self, dedupe_key: &str) -> Result<Option<ActionRecord>, LedgerError> {
        let now = self.clock.now();
        let records = self
            .store
            .query(Scope::ActionLedger, &RecordQuery::new().key(dedupe_key))
            .await?;
        for record in records {
            if record.is_live(now) {
                return Ok(Some(record.decode()?));
            }
        }
        Ok(None)
    }

    /// Remove expired claims from the store
    ///
    /// # Errors
    /// Store failure
    pub async fn purge_expired(&self) -> Result<usize, LedgerError> {
        let removed = self
            .store
            .purge_expired(Scope::ActionLedger, self.clock.now())
            .await?;
        self.confirmed.run_pending_tasks().await;
        Ok(removed)
    }
}
