//! In-memory reference implementation of the refresh-token store. Intended
//! for tests and embedded use; a production deployment points the engine at
//! a database-backed implementation of the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::store::{RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult};

#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records held, revoked and expired included.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn get(&self, token: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self.records.read().get(token).cloned())
    }

    async fn create(&self, record: RefreshTokenRecord) -> StoreResult<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.token) {
            return Err(StoreError::Conflict);
        }
        records.insert(record.token.clone(), record);
        Ok(())
    }

    async fn consume_for_rotation(
        &self,
        token: &str,
        revoked_by_ip: &str,
        replaced_by_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut records = self.records.write();
        match records.get_mut(token) {
            Some(record) if record.is_active(now) => {
                record.revoked_by_ip = Some(revoked_by_ip.to_string());
                record.replaced_by_token = Some(replaced_by_token.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, token: &str, revoked_by_ip: &str) -> StoreResult<bool> {
        let mut records = self.records.write();
        match records.get_mut(token) {
            Some(record) if !record.is_revoked() => {
                record.revoked_by_ip = Some(revoked_by_ip.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_family(&self, family: Uuid, revoked_by_ip: &str) -> StoreResult<u64> {
        let mut records = self.records.write();
        let mut changed = 0;
        for record in records.values_mut() {
            if record.family == family && !record.is_revoked() {
                record.revoked_by_ip = Some(revoked_by_ip.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, revoked_by_ip: &str) -> StoreResult<u64> {
        let mut records = self.records.write();
        let mut changed = 0;
        for record in records.values_mut() {
            if record.user_id == user_id && !record.is_revoked() {
                record.revoked_by_ip = Some(revoked_by_ip.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn active_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<RefreshTokenRecord>> {
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|record| record.user_id == user_id && record.is_active(now))
            .cloned()
            .collect())
    }
}
