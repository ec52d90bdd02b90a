use serde::Serialize;
use std::fmt;

/// Binds a token pair to one particular login of a user.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client details captured by the HTTP layer at login.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: String,
}

/// Server-side proof of an active login. Timestamps are unix seconds.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub username: String,
    pub login_time: i64,
    pub ip: String,
    pub user_agent: String,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<i64>,
    #[serde(skip)]
    pub session_id: Option<SessionId>,
}

impl SessionRecord {
    pub fn new(
        username: impl Into<String>,
        login_time: i64,
        meta: &RequestMeta,
        session_id: SessionId,
    ) -> Self {
        SessionRecord {
            username: username.into(),
            login_time,
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            locked: false,
            locked_at: None,
            unlocked_at: None,
            session_id: Some(session_id),
        }
    }

    /// Seconds spent locked as of `now`, or `None` when the record is unlocked
    /// or carries no lock timestamp.
    pub fn lock_duration(&self, now: i64) -> Option<i64> {
        if !self.locked {
            return None;
        }
        self.locked_at.map(|locked_at| now - locked_at)
    }

    /// A lock times out once it has lasted strictly longer than `timeout_secs`.
    pub fn lock_timed_out(&self, now: i64, timeout_secs: i64) -> bool {
        self.lock_duration(now)
            .is_some_and(|duration| duration > timeout_secs)
    }

    pub fn is_bound_to(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }
}

/// Field-level mutation of an existing session record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionPatch {
    Lock { locked_at: i64 },
    Unlock { unlocked_at: i64 },
}

impl SessionPatch {
    pub fn apply(self, record: &mut SessionRecord) {
        match self {
            SessionPatch::Lock { locked_at } => {
                record.locked = true;
                record.locked_at = Some(locked_at);
            }
            SessionPatch::Unlock { unlocked_at } => {
                record.locked = false;
                record.locked_at = None;
                record.unlocked_at = Some(unlocked_at);
            }
        }
    }
}
