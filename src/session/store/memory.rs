use crate::session::store::{ExpiredDeletion, Result, SessionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Option<OffsetDateTime>,
}

impl MemoryEntry {
    fn is_active(&self) -> bool {
        self.expires_at
            .is_none_or(|expires_at| expires_at > OffsetDateTime::now_utc())
    }
}

/// An in-memory session store.
///
/// Used when no Redis instance is configured and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sessions: Arc<DashMap<Vec<u8>, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, session_id: &[u8], data: &[u8], ttl: Option<u64>) -> Result<()> {
        let expires_at = ttl.map(|ttl| {
            OffsetDateTime::now_utc().saturating_add(Duration::seconds(ttl as i64))
        });
        self.sessions.insert(
            session_id.to_vec(),
            MemoryEntry {
                data: data.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn load(&self, session_id: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.sessions.get(session_id) {
            if entry.is_active() {
                return Ok(Some(entry.data.clone()));
            }
        }
        self.sessions.remove_if(session_id, |_, entry| !entry.is_active());
        Ok(None)
    }

    async fn exists(&self, session_id: &[u8]) -> Result<bool> {
        Ok(self
            .sessions
            .get(session_id)
            .is_some_and(|entry| entry.is_active()))
    }

    async fn delete(&self, session_id: &[u8]) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn take(&self, session_id: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .sessions
            .remove(session_id)
            .map(|(_, entry)| entry)
            .filter(MemoryEntry::is_active)
            .map(|entry| entry.data))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.sessions.len())
    }
}

#[async_trait]
impl ExpiredDeletion for MemoryStore {
    async fn delete_expired(&self) -> Result<()> {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.is_active());
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Deleted expired sessions");
        }
        Ok(())
    }
}
