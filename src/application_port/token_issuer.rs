use crate::application_port::TokenPair;
use crate::domain_model::*;
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("token signing failed: {0}")]
    SigningFailed(String),
    #[error("refresh token record not written: {0}")]
    StoreWriteFailed(#[from] StoreError),
}

/// Claims of a token that passed signature, audience, kind and expiry checks.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub identity: Identity,
    pub kind: TokenKind,
    pub token_id: String,
    pub session_id: SessionId,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[async_trait::async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Sign an access/refresh pair and persist the refresh-token record.
    /// Nothing is returned unless both steps succeed.
    async fn issue_token_pair(
        &self,
        identity: &Identity,
        session_id: &SessionId,
    ) -> Result<TokenPair, TokenError>;

    async fn issue_access_token(
        &self,
        identity: &Identity,
        session_id: &SessionId,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError>;

    async fn verify_token(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<VerifiedClaims, TokenError>;
}
