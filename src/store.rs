//! Durable refresh-token records and the storage contract the rotation
//! engine is written against. The store is a collaborator: any backend that
//! honors the conditional-write semantics of [`RefreshTokenStore::consume_for_rotation`]
//! can sit behind the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One persisted refresh token. Records are never physically deleted by
/// this subsystem; a revoked or expired record stays behind for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Opaque random value, the primary lookup key.
    pub token: String,
    pub user_id: Uuid,
    /// Shared by every token descended from one login; immutable across
    /// rotations.
    pub family: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: String,
    /// Write-once: never cleared after it is set.
    pub revoked_by_ip: Option<String>,
    /// Audit pointer to the successor token; set only when this token was
    /// consumed by a successful rotation, never on a plain revoke.
    pub replaced_by_token: Option<String>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_by_ip.is_some()
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_revoked()
    }
}

/// Storage contract for refresh tokens. Implementations must provide
/// read-after-write consistency per call and make `consume_for_rotation`
/// atomic, since that single conditional write is what serializes
/// concurrent rotations of the same token.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn get(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Insert a fresh record. A duplicate token value is a `Conflict`.
    async fn create(&self, record: RefreshTokenRecord) -> StoreResult<()>;

    /// Atomically mark `token` revoked and link it to its successor, but
    /// only if it is still active at `now`. Returns `false` when the record
    /// was already revoked or expired; the loser of a concurrent rotation
    /// race observes `false`.
    async fn consume_for_rotation(
        &self,
        token: &str,
        revoked_by_ip: &str,
        replaced_by_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Unconditional revoke for logout paths. Does not touch
    /// `replaced_by_token`. Returns `false` if the token was already
    /// revoked (or does not exist).
    async fn revoke(&self, token: &str, revoked_by_ip: &str) -> StoreResult<bool>;

    /// Revoke every currently-unrevoked token in the family. Returns the
    /// number of records changed.
    async fn revoke_family(&self, family: Uuid, revoked_by_ip: &str) -> StoreResult<u64>;

    /// Revoke every currently-unrevoked token owned by the user, across
    /// all families. Returns the number of records changed.
    async fn revoke_all_for_user(&self, user_id: Uuid, revoked_by_ip: &str) -> StoreResult<u64>;

    async fn active_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<RefreshTokenRecord>>;
}
