use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Client-visible failure of a session operation.
///
/// The `String` payloads carry lower-layer detail for logs only; clients see
/// [`AuthError::code`] and [`AuthError::public_message`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("missing credentials")]
    MissingCredentials,
    #[error("missing password")]
    MissingPassword,
    #[error("missing refresh token")]
    MissingRefreshToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid password")]
    InvalidPassword,
    #[error("token signing failed: {0}")]
    TokenSigningFailed(String),
    #[error("token generation failed: {0}")]
    TokenGenerationFailed(String),
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),
    #[error("session storage failed: {0}")]
    SessionStorageFailed(String),
    #[error("session retrieval failed: {0}")]
    SessionRetrievalFailed(String),
    #[error("session check failed: {0}")]
    SessionCheckFailed(String),
    #[error("missing token")]
    MissingToken,
    #[error("invalid token format")]
    InvalidTokenFormat,
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("refresh token not found")]
    RefreshTokenNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("session not locked")]
    SessionNotLocked,
    #[error("session locked")]
    SessionLocked,
    #[error("lock timeout")]
    LockTimeout,
    #[error("user not found")]
    UserNotFound,
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    ServerFault,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest(_) => "INVALID_REQUEST",
            AuthError::MissingCredentials => "MISSING_CREDENTIALS",
            AuthError::MissingPassword => "MISSING_PASSWORD",
            AuthError::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidPassword => "INVALID_PASSWORD",
            AuthError::TokenSigningFailed(_) => "TOKEN_SIGNING_FAILED",
            AuthError::TokenGenerationFailed(_) => "TOKEN_GENERATION_FAILED",
            AuthError::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            AuthError::SessionStorageFailed(_) => "SESSION_STORAGE_FAILED",
            AuthError::SessionRetrievalFailed(_) => "SESSION_RETRIEVAL_FAILED",
            AuthError::SessionCheckFailed(_) => "SESSION_CHECK_FAILED",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidTokenFormat => "INVALID_TOKEN_FORMAT",
            AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::RefreshTokenNotFound => "REFRESH_TOKEN_NOT_FOUND",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::SessionExpired => "SESSION_EXPIRED",
            AuthError::SessionNotLocked => "SESSION_NOT_LOCKED",
            AuthError::SessionLocked => "SESSION_LOCKED",
            AuthError::LockTimeout => "LOCK_TIMEOUT",
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> ErrorClass {
        match self {
            AuthError::InvalidRequest(_)
            | AuthError::MissingCredentials
            | AuthError::MissingPassword
            | AuthError::MissingRefreshToken
            | AuthError::SessionNotLocked => ErrorClass::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::InvalidPassword
            | AuthError::MissingToken
            | AuthError::InvalidTokenFormat
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidRefreshToken
            | AuthError::RefreshTokenNotFound
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::LockTimeout
            | AuthError::UserNotFound => ErrorClass::Unauthorized,
            AuthError::SessionLocked => ErrorClass::Forbidden,
            AuthError::TokenSigningFailed(_)
            | AuthError::TokenGenerationFailed(_)
            | AuthError::StoreWriteFailed(_)
            | AuthError::SessionStorageFailed(_)
            | AuthError::SessionRetrievalFailed(_)
            | AuthError::SessionCheckFailed(_)
            | AuthError::InternalError(_) => ErrorClass::ServerFault,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest(_) => "Invalid request body",
            AuthError::MissingCredentials => "Username and password are required",
            AuthError::MissingPassword => "Password is required",
            AuthError::MissingRefreshToken => "Refresh token is required",
            AuthError::InvalidCredentials => "Invalid username or password",
            AuthError::InvalidPassword => "Invalid password",
            AuthError::TokenSigningFailed(_) => "Failed to sign token",
            AuthError::TokenGenerationFailed(_) => "Failed to generate tokens",
            AuthError::StoreWriteFailed(_) => "Failed to write session data",
            AuthError::SessionStorageFailed(_) => "Failed to store session data",
            AuthError::SessionRetrievalFailed(_) => "Failed to retrieve session data",
            AuthError::SessionCheckFailed(_) => "Failed to verify session",
            AuthError::MissingToken => "Authorization token is required",
            AuthError::InvalidTokenFormat => "Authorization token format is invalid",
            AuthError::InvalidOrExpiredToken => "Authorization token is invalid or expired",
            AuthError::InvalidRefreshToken => "Refresh token is invalid or expired",
            AuthError::RefreshTokenNotFound => "Refresh token has been revoked or was never issued",
            AuthError::SessionNotFound => "Session not found or has expired",
            AuthError::SessionExpired => "Session has expired. Please login again.",
            AuthError::SessionNotLocked => "Session is not locked",
            AuthError::SessionLocked => "User session is locked. Please unlock to continue.",
            AuthError::LockTimeout => "Session expired due to inactivity. Please login again.",
            AuthError::UserNotFound => "User not found",
            AuthError::InternalError(_) => "Internal error",
        }
    }
}

/// Tunables of the session state machine.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// TTL applied to `session:{user_id}` on creation and on every rewrite.
    pub session_ttl: Duration,
    pub lock_timeout: Duration,
    /// A new login revokes every earlier session and refresh token of the user.
    pub single_session: bool,
    /// Refresh hands out a new refresh token and revokes the presented one.
    pub rotate_refresh_tokens: bool,
    pub verifier_timeout: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        SessionPolicy {
            session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            lock_timeout: Duration::from_secs(600),
            single_session: true,
            rotate_refresh_tokens: false,
            verifier_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub meta: RequestMeta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    /// `jti` of the refresh token; names its `refresh_token:{id}:{jti}` record.
    #[serde(skip)]
    pub refresh_token_id: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub identity: Identity,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResult {
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
    /// Only present when refresh tokens are rotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockResult {
    pub locked_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResult {
    pub unlocked_at: i64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<i64>,
    /// Seconds left before a locked session is evicted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: Identity,
    pub session: SessionRecord,
}

/// The named operations of the session lifecycle.
#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    async fn login(&self, input: LoginInput) -> Result<LoginResult, AuthError>;
    async fn logout(&self, user_id: &UserId) -> Result<(), AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError>;
    async fn lock(&self, user_id: &UserId) -> Result<LockResult, AuthError>;
    async fn unlock(&self, identity: &Identity, password: &str)
    -> Result<UnlockResult, AuthError>;
    async fn check_session(&self, user_id: &UserId) -> Result<SessionStatus, AuthError>;
    async fn profile(&self, identity: &Identity) -> Result<Profile, AuthError>;
}
