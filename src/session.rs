//! Best-effort session/device tracking. Registration runs after a login
//! succeeds and its failure is logged and swallowed by the caller; nothing
//! in the token lifecycle depends on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::store::StoreResult;

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub ip: String,
    pub user_agent: String,
    pub registered_at: DateTime<Utc>,
}

#[async_trait]
pub trait SessionRegistrar: Send + Sync {
    async fn register(&self, user_id: Uuid, ip: &str, user_agent: &str) -> StoreResult<Uuid>;
}

/// In-memory reference registrar; keeps a flat history of registrations.
#[derive(Default)]
pub struct InMemorySessionRegistrar {
    sessions: RwLock<Vec<SessionEntry>>,
}

impl InMemorySessionRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<SessionEntry> {
        self.sessions.read().clone()
    }
}

#[async_trait]
impl SessionRegistrar for InMemorySessionRegistrar {
    async fn register(&self, user_id: Uuid, ip: &str, user_agent: &str) -> StoreResult<Uuid> {
        let entry = SessionEntry {
            session_id: Uuid::new_v4(),
            user_id,
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            registered_at: Utc::now(),
        };
        let session_id = entry.session_id;
        self.sessions.write().push(entry);
        Ok(session_id)
    }
}
