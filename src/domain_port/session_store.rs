use crate::domain_model::*;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Persistence of session records and refresh-token records in the shared
/// key-value store.
///
/// Every method is atomic for the single key it touches. Nothing spans keys,
/// so callers composing several calls get no isolation between them.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the whole record under `session:{user_id}`, dropping whatever was
    /// there before, and set its TTL.
    async fn create_or_replace_session(
        &self,
        user_id: &UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>, StoreError>;

    /// Apply `patch` to an existing record and re-arm its TTL. Returns `false`
    /// without writing anything if the record does not exist.
    async fn update_session(
        &self,
        user_id: &UserId,
        patch: SessionPatch,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Deleting a missing record is a no-op.
    async fn delete_session(&self, user_id: &UserId) -> Result<(), StoreError>;

    async fn put_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Returns whether a live record was actually removed. Of several callers
    /// racing on one record, at most one sees `true`.
    async fn delete_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<bool, StoreError>;

    /// Remove every `refresh_token:{user_id}:*` record; returns how many went.
    async fn delete_all_refresh_tokens(&self, user_id: &UserId) -> Result<usize, StoreError>;
}

pub fn session_key(user_id: &UserId) -> String {
    format!("session:{}", user_id)
}

pub fn refresh_token_key(user_id: &UserId, token_id: &str) -> String {
    format!("refresh_token:{}:{}", user_id, token_id)
}

pub fn refresh_token_pattern(user_id: &UserId) -> String {
    format!("refresh_token:{}:*", user_id)
}
