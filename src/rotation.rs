//! The refresh-token state machine: one-token-per-use rotation, reuse
//! detection, and cascading family revocation. The engine is stateless
//! across calls; serialization of concurrent rotations of the same token
//! comes entirely from the store's conditional write.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::store::{RefreshTokenRecord, RefreshTokenStore};

const TOKEN_LEN: usize = 32;

#[derive(Debug)]
pub struct RotationOutcome {
    pub user_id: Uuid,
    pub family: Uuid,
    pub new_token: RefreshTokenRecord,
}

#[derive(Clone)]
pub struct RotationEngine {
    store: Arc<dyn RefreshTokenStore>,
    refresh_token_ttl: Duration,
}

impl RotationEngine {
    pub fn new(store: Arc<dyn RefreshTokenStore>, refresh_token_ttl: Duration) -> Self {
        Self {
            store,
            refresh_token_ttl,
        }
    }

    /// Login path: start a brand-new family and persist its first token.
    pub async fn issue_family(
        &self,
        user_id: Uuid,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<RefreshTokenRecord> {
        let record = RefreshTokenRecord {
            token: generate_opaque_token(),
            user_id,
            family: Uuid::new_v4(),
            created_at: now,
            expires_at: now + self.refresh_token_ttl,
            created_by_ip: client_ip.to_string(),
            revoked_by_ip: None,
            replaced_by_token: None,
        };
        self.store.create(record.clone()).await?;
        log::debug!(
            "issued refresh token family {} for user {}",
            record.family,
            user_id
        );
        Ok(record)
    }

    /// Exchange one active refresh token for exactly one successor.
    ///
    /// A presented token that is already revoked can only mean reuse: a
    /// legitimate client never replays a rotated token. The same holds for
    /// losing the conditional write to a concurrent rotation. Both paths
    /// revoke the whole family before failing.
    pub async fn rotate(
        &self,
        presented: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<RotationOutcome> {
        let record = match self.store.get(presented).await? {
            Some(record) => record,
            None => {
                log::debug!("unknown refresh token {} presented", token_prefix(presented));
                return Err(AuthError::TokenInvalid);
            }
        };

        if record.is_expired(now) {
            log::debug!(
                "expired refresh token {} presented for user {}",
                token_prefix(presented),
                record.user_id
            );
            return Err(AuthError::TokenExpired);
        }

        if record.is_revoked() {
            return self.handle_reuse(&record, client_ip).await;
        }

        let successor = generate_opaque_token();
        let consumed = self
            .store
            .consume_for_rotation(presented, client_ip, &successor, now)
            .await?;
        if !consumed {
            // A concurrent rotation won the race between our read and the
            // conditional write. Indistinguishable from theft.
            return self.handle_reuse(&record, client_ip).await;
        }

        let new_record = RefreshTokenRecord {
            token: successor,
            user_id: record.user_id,
            family: record.family,
            created_at: now,
            expires_at: now + self.refresh_token_ttl,
            created_by_ip: client_ip.to_string(),
            revoked_by_ip: None,
            replaced_by_token: None,
        };
        self.store.create(new_record.clone()).await?;

        Ok(RotationOutcome {
            user_id: record.user_id,
            family: record.family,
            new_token: new_record,
        })
    }

    /// Logout: revoke the presented token (ownership checked), then every
    /// active token the user holds across all families.
    pub async fn logout(
        &self,
        user_id: Uuid,
        presented: &str,
        client_ip: &str,
    ) -> AuthResult<u64> {
        let record = match self.store.get(presented).await? {
            Some(record) => record,
            None => {
                log::debug!(
                    "logout with unknown refresh token {} for user {}",
                    token_prefix(presented),
                    user_id
                );
                return Err(AuthError::TokenInvalid);
            }
        };

        if record.user_id != user_id {
            log::warn!(
                "logout token {} belongs to user {} but was presented for user {}",
                token_prefix(presented),
                record.user_id,
                user_id
            );
            return Err(AuthError::TokenInvalid);
        }

        self.store.revoke(presented, client_ip).await?;
        let revoked = self.store.revoke_all_for_user(user_id, client_ip).await?;
        log::info!("logout revoked {} tokens for user {}", revoked, user_id);
        Ok(revoked)
    }

    /// Administrative "sign out of this family" and the theft-detection
    /// cascade share this path.
    pub async fn revoke_family(
        &self,
        family: Uuid,
        client_ip: &str,
    ) -> AuthResult<u64> {
        let revoked = self.store.revoke_family(family, client_ip).await?;
        Ok(revoked)
    }

    /// Administrative "sign out everywhere".
    pub async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        client_ip: &str,
    ) -> AuthResult<u64> {
        let revoked = self.store.revoke_all_for_user(user_id, client_ip).await?;
        log::info!("revoked {} tokens for user {}", revoked, user_id);
        Ok(revoked)
    }

    async fn handle_reuse(
        &self,
        record: &RefreshTokenRecord,
        client_ip: &str,
    ) -> AuthResult<RotationOutcome> {
        let revoked = self.store.revoke_family(record.family, client_ip).await?;
        log::warn!(
            "refresh token reuse detected: token {} family {} user {}; revoked {} family tokens",
            token_prefix(&record.token),
            record.family,
            record.user_id,
            revoked
        );
        Err(AuthError::SecurityViolation {
            user_id: record.user_id,
        })
    }
}

fn generate_opaque_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Short prefix for log lines; full token values never reach the logs.
/// Tokens come from callers, so the cut must land on a char boundary.
fn token_prefix(token: &str) -> &str {
    let mut end = token.len().min(8);
    while !token.is_char_boundary(end) {
        end -= 1;
    }
    &token[..end]
}
