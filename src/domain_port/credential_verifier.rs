use crate::domain_model::*;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Verification {
    Verified(UserId),
    UnknownUser,
    WrongPassword,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("credential backend error: {0}")]
    Backend(String),
}

/// Checks a username/password pair against wherever credentials live.
#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str)
    -> Result<Verification, VerifierError>;
}
