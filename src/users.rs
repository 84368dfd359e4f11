//! The user-aggregate collaborator. This crate reads identity and role and
//! writes back only the credential (rehash-on-login); everything else about
//! users belongs to the surrounding system.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::passwords::Credential;
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn from_str(role: &str) -> Self {
        match role {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub credential: Credential,
    pub disabled: bool,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    /// Persist a rewritten credential, e.g. after a legacy-format rehash.
    async fn update_credential(&self, user_id: Uuid, credential: Credential) -> StoreResult<()>;
}

/// In-memory reference directory for tests and embedded use.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.write().insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.read();
        Ok(users
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn update_credential(&self, user_id: Uuid, credential: Credential) -> StoreResult<()> {
        let mut users = self.users.write();
        match users.get_mut(&user_id) {
            Some(user) => {
                user.credential = credential;
                Ok(())
            }
            None => Err(StoreError::Unavailable(format!(
                "user {user_id} not found for credential update"
            ))),
        }
    }
}
