use crate::application_port::AuthError;
use crate::domain_model::UserId;
use crate::domain_port::{CredentialVerifier, Verification, VerifierError};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::collections::HashMap;
use std::time::Duration;

/// Produce a PHC string suitable for the `[[users]]` table.
pub fn hash_password(password: &str) -> Result<String, VerifierError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| VerifierError::Backend(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Stands in for the hash of an unknown user so that lookups for missing and
/// existing usernames cost the same Argon2 work. Well formed, matches nothing.
const DUMMY_PHC: &str = "$argon2id$v=19$m=19456,t=2,p=1$c2Vzc2lvbmdhdGUtZHVtbXk$NJ/rxIxx1nmNWTIb77VlLAbamRF5yUXifmcvzzfo3b0";

fn verify_phc(password: &str, password_hash: &str) -> Result<bool, VerifierError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| VerifierError::Backend(format!("invalid PHC hash: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(VerifierError::Backend(format!("verify error: {e}"))),
    }
}

#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub user_id: UserId,
    pub password_hash: String,
}

/// Verifies passwords against Argon2 PHC hashes held in memory.
pub struct Argon2CredentialVerifier {
    users: HashMap<String, StoredCredential>,
}

impl Argon2CredentialVerifier {
    pub fn new(users: HashMap<String, StoredCredential>) -> Self {
        Argon2CredentialVerifier { users }
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for Argon2CredentialVerifier {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Verification, VerifierError> {
        let stored = self.users.get(username).cloned();
        let hash = stored
            .as_ref()
            .map_or(DUMMY_PHC.to_string(), |s| s.password_hash.clone());

        // Argon2 is deliberately slow; keep it off the async workers.
        let password = password.to_string();
        let ok = tokio::task::spawn_blocking(move || verify_phc(&password, &hash))
            .await
            .map_err(|e| VerifierError::Backend(e.to_string()))??;

        match stored {
            None => Ok(Verification::UnknownUser),
            Some(stored) if ok => Ok(Verification::Verified(stored.user_id)),
            Some(_) => Ok(Verification::WrongPassword),
        }
    }
}

/// Plain-text credentials for local runs and tests.
#[derive(Debug)]
pub struct FakeCredentialVerifier {
    users: HashMap<String, (UserId, String)>,
}

impl FakeCredentialVerifier {
    /// `user1`, `user2` and `user3` with ids `1`..`3`, all using `password`.
    pub fn new() -> Self {
        let users = (1..=3)
            .map(|n| {
                (
                    format!("user{n}"),
                    (UserId(n.to_string()), "password".to_string()),
                )
            })
            .collect();
        Self { users }
    }

    pub fn with_user(mut self, user_id: &str, username: &str, password: &str) -> Self {
        self.users.insert(
            username.to_string(),
            (UserId::from(user_id), password.to_string()),
        );
        self
    }
}

impl Default for FakeCredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialVerifier for FakeCredentialVerifier {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Verification, VerifierError> {
        match self.users.get(username) {
            None => Ok(Verification::UnknownUser),
            Some((user_id, expected)) if expected == password => {
                Ok(Verification::Verified(user_id.clone()))
            }
            Some(_) => Ok(Verification::WrongPassword),
        }
    }
}

/// Run the verifier under a deadline; failures and timeouts are server faults.
pub(crate) async fn verify_within(
    verifier: &dyn CredentialVerifier,
    username: &str,
    password: &str,
    deadline: Duration,
) -> Result<Verification, AuthError> {
    match tokio::time::timeout(deadline, verifier.verify(username, password)).await {
        Ok(result) => result.map_err(|e| AuthError::InternalError(e.to_string())),
        Err(_) => Err(AuthError::InternalError(format!(
            "credential verifier timed out after {deadline:?}"
        ))),
    }
}
