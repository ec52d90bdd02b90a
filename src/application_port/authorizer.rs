use crate::application_port::AuthError;
use crate::domain_model::*;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DenyReason {
    MissingToken,
    InvalidTokenFormat,
    InvalidOrExpiredToken,
    SessionNotFound,
    LockTimeout,
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::MissingToken => AuthError::MissingToken,
            DenyReason::InvalidTokenFormat => AuthError::InvalidTokenFormat,
            DenyReason::InvalidOrExpiredToken => AuthError::InvalidOrExpiredToken,
            DenyReason::SessionNotFound => AuthError::SessionNotFound,
            DenyReason::LockTimeout => AuthError::LockTimeout,
        }
    }
}

/// Outcome of ratifying a bearer token against the session store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AuthDecision {
    Allow(Identity),
    Deny(DenyReason),
    /// The session exists but is locked and the path is not allowed while locked.
    Locked,
}

impl AuthDecision {
    pub fn into_result(self) -> Result<Identity, AuthError> {
        match self {
            AuthDecision::Allow(identity) => Ok(identity),
            AuthDecision::Deny(reason) => Err(reason.into()),
            AuthDecision::Locked => Err(AuthError::SessionLocked),
        }
    }
}

#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    /// `authorization` is the raw `Authorization` header value, if any.
    /// `Err` is reserved for store faults; every client-side problem is a decision.
    async fn authorize(
        &self,
        authorization: Option<&str>,
        path: &str,
    ) -> Result<AuthDecision, AuthError>;
}
