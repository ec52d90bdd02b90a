use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const SESSION_UPDATE: &str = include_str!("session_update.lua");

const FIELD_USERNAME: &str = "username";
const FIELD_LOGIN_TIME: &str = "loginTime";
const FIELD_IP: &str = "ip";
const FIELD_USER_AGENT: &str = "userAgent";
const FIELD_LOCKED: &str = "locked";
const FIELD_LOCKED_AT: &str = "lockedAt";
const FIELD_UNLOCKED_AT: &str = "unlockedAt";
const FIELD_SESSION_ID: &str = "sessionId";

pub struct RedisSessionStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    update_script: Script,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, op_timeout: Duration) -> Self {
        RedisSessionStore {
            conn,
            op_timeout,
            update_script: Script::new(SESSION_UPDATE),
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result.map_err(|e| StoreError::Backend(e.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// KEYS treats `*?[]\` specially; user ids are matched literally.
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn encode_session(record: &SessionRecord) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        (FIELD_USERNAME, record.username.clone()),
        (FIELD_LOGIN_TIME, record.login_time.to_string()),
        (FIELD_IP, record.ip.clone()),
        (FIELD_USER_AGENT, record.user_agent.clone()),
        (FIELD_LOCKED, record.locked.to_string()),
    ];
    if let Some(locked_at) = record.locked_at {
        fields.push((FIELD_LOCKED_AT, locked_at.to_string()));
    }
    if let Some(unlocked_at) = record.unlocked_at {
        fields.push((FIELD_UNLOCKED_AT, unlocked_at.to_string()));
    }
    if let Some(session_id) = &record.session_id {
        fields.push((FIELD_SESSION_ID, session_id.0.clone()));
    }
    fields
}

fn decode_session(
    key: &str,
    mut fields: HashMap<String, String>,
) -> Result<Option<SessionRecord>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let timestamp = |fields: &HashMap<String, String>, name: &str| -> Result<Option<i64>, StoreError> {
        fields
            .get(name)
            .map(|raw| {
                raw.parse::<i64>().map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: format!("{name}: {e}"),
                })
            })
            .transpose()
    };

    let login_time = timestamp(&fields, FIELD_LOGIN_TIME)?.unwrap_or_default();
    let locked_at = timestamp(&fields, FIELD_LOCKED_AT)?;
    let unlocked_at = timestamp(&fields, FIELD_UNLOCKED_AT)?;
    let locked = matches!(
        fields.get(FIELD_LOCKED).map(String::as_str),
        Some("1") | Some("true")
    );

    Ok(Some(SessionRecord {
        username: fields.remove(FIELD_USERNAME).unwrap_or_default(),
        login_time,
        ip: fields.remove(FIELD_IP).unwrap_or_default(),
        user_agent: fields.remove(FIELD_USER_AGENT).unwrap_or_default(),
        locked,
        locked_at: if locked { locked_at } else { None },
        unlocked_at,
        session_id: fields.remove(FIELD_SESSION_ID).map(SessionId),
    }))
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_or_replace_session(
        &self,
        user_id: &UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = session_key(user_id);
        let fields = encode_session(record);
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, fields.as_slice())
            .ignore()
            .expire(&key, ttl_secs(ttl) as i64)
            .ignore();
        let _: () = self.bounded(pipe.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>, StoreError> {
        let key = session_key(user_id);
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = self.bounded(conn.hgetall(&key)).await?;
        decode_session(&key, fields)
    }

    async fn update_session(
        &self,
        user_id: &UserId,
        patch: SessionPatch,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let key = session_key(user_id);
        let (mode, timestamp) = match patch {
            SessionPatch::Lock { locked_at } => ("lock", locked_at),
            SessionPatch::Unlock { unlocked_at } => ("unlock", unlocked_at),
        };
        let mut conn = self.conn.clone();
        let mut invocation = self.update_script.key(&key);
        invocation.arg(ttl_secs(ttl)).arg(mode).arg(timestamp);
        let updated: i64 = self.bounded(invocation.invoke_async(&mut conn)).await?;
        Ok(updated == 1)
    }

    async fn delete_session(&self, user_id: &UserId) -> Result<(), StoreError> {
        let key = session_key(user_id);
        let mut conn = self.conn.clone();
        let _: () = self.bounded(conn.del(&key)).await?;
        Ok(())
    }

    async fn put_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let key = refresh_token_key(user_id, token_id);
        let mut conn = self.conn.clone();
        let _: () = self
            .bounded(conn.set_ex(&key, token, ttl_secs(ttl)))
            .await?;
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let key = refresh_token_key(user_id, token_id);
        let mut conn = self.conn.clone();
        self.bounded(conn.get(&key)).await
    }

    async fn delete_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<bool, StoreError> {
        let key = refresh_token_key(user_id, token_id);
        let mut conn = self.conn.clone();
        let removed: usize = self.bounded(conn.del(&key)).await?;
        Ok(removed > 0)
    }

    async fn delete_all_refresh_tokens(&self, user_id: &UserId) -> Result<usize, StoreError> {
        let pattern = format!("refresh_token:{}:*", escape_glob(user_id.as_str()));
        let mut conn = self.conn.clone();
        let keys: Vec<String> = self.bounded(conn.keys(&pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = self.bounded(conn.del(&keys)).await?;
        Ok(removed)
    }
}
