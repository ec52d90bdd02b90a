use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// In-process stand-in for the shared store. Same key layout as Redis, TTLs
/// are enforced lazily against the injected clock.
pub struct MemorySessionStore {
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, Expiring<SessionRecord>>,
    refresh_tokens: DashMap<String, Expiring<String>>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemorySessionStore {
            clock,
            sessions: DashMap::new(),
            refresh_tokens: DashMap::new(),
        }
    }

    /// Number of unexpired refresh-token records held for `user_id`.
    pub fn live_refresh_tokens(&self, user_id: &UserId) -> usize {
        let prefix = pattern_prefix(user_id);
        let now = self.clock.now();
        self.refresh_tokens
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix) && entry.expires_at > now)
            .count()
    }

    /// Synchronous peek at the session record, honouring its TTL.
    pub fn get_session_now(&self, user_id: &UserId) -> Option<SessionRecord> {
        Self::live(&self.sessions, &session_key(user_id), self.clock.now())
    }

    fn live<T: Clone>(
        map: &DashMap<String, Expiring<T>>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let found = match map.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if found.is_none() {
            map.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        found
    }
}

fn pattern_prefix(user_id: &UserId) -> String {
    refresh_token_pattern(user_id)
        .trim_end_matches('*')
        .to_string()
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_or_replace_session(
        &self,
        user_id: &UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = self.clock.now() + ttl;
        self.sessions.insert(
            session_key(user_id),
            Expiring {
                value: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(Self::live(
            &self.sessions,
            &session_key(user_id),
            self.clock.now(),
        ))
    }

    async fn update_session(
        &self,
        user_id: &UserId,
        patch: SessionPatch,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let key = session_key(user_id);
        let updated = match self.sessions.get_mut(&key) {
            Some(mut entry) if entry.expires_at > now => {
                patch.apply(&mut entry.value);
                entry.expires_at = now + ttl;
                true
            }
            _ => false,
        };
        if !updated {
            self.sessions.remove_if(&key, |_, entry| entry.expires_at <= now);
        }
        Ok(updated)
    }

    async fn delete_session(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.sessions.remove(&session_key(user_id));
        Ok(())
    }

    async fn put_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = self.clock.now() + ttl;
        self.refresh_tokens.insert(
            refresh_token_key(user_id, token_id),
            Expiring {
                value: token.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(Self::live(
            &self.refresh_tokens,
            &refresh_token_key(user_id, token_id),
            self.clock.now(),
        ))
    }

    async fn delete_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let removed = self
            .refresh_tokens
            .remove(&refresh_token_key(user_id, token_id));
        Ok(removed.is_some_and(|(_, entry)| entry.expires_at > now))
    }

    async fn delete_all_refresh_tokens(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let prefix = pattern_prefix(user_id);
        let now = self.clock.now();
        let keys: Vec<String> = self
            .refresh_tokens
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();
        let removed = keys
            .iter()
            .filter_map(|key| self.refresh_tokens.remove(key))
            .filter(|(_, entry)| entry.expires_at > now)
            .count();
        Ok(removed)
    }
}
