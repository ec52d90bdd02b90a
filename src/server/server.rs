use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::domain_port::*;
use crate::infra_memory::MemorySessionStore;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Auth, Settings, User};
use anyhow::{anyhow, bail};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const SIGNING_KEY_ENV: &str = "JWT_SIGNING_KEY";

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
    pub authorizer: Arc<dyn Authorizer>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn SessionStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new(clock.clone())),
            "redis" => {
                let client = redis::Client::open(settings.store.dsn.expose())?;
                let manager = client.get_connection_manager().await?;
                Arc::new(RedisSessionStore::new(
                    manager,
                    Duration::from_millis(settings.store.op_timeout_ms),
                ))
            }
            other => bail!("Unknown store backend: {}", other),
        };

        let verifier: Arc<dyn CredentialVerifier> = match settings.auth.credentials.as_str() {
            "fake" => Arc::new(FakeCredentialVerifier::new()),
            "real" => {
                if settings.users.is_empty() {
                    warn!("credentials backend is real but no users are configured");
                }
                Arc::new(Argon2CredentialVerifier::new(credential_table(
                    &settings.users,
                )))
            }
            other => bail!("Unknown credentials backend: {}", other),
        };

        let signing_key = signing_key(&settings.auth)?;
        let server = Self::assemble(&settings.auth, store, verifier, clock, signing_key);

        info!(
            store = %settings.store.backend,
            credentials = %settings.auth.credentials,
            "server started"
        );
        Ok(server)
    }

    /// Wire the services over already constructed backends.
    pub fn assemble(
        auth: &Auth,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
        signing_key: Vec<u8>,
    ) -> Self {
        let policy = session_policy(auth);
        let issuer: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(
            JwtConfig {
                issuer: auth.issuer.clone(),
                audience: auth.audience.clone(),
                access_ttl: Duration::from_secs(auth.access_ttl_secs),
                refresh_ttl: Duration::from_secs(auth.refresh_ttl_secs),
                signing_key,
            },
            clock.clone(),
            store.clone(),
        ));

        let session_service: Arc<dyn SessionService> = Arc::new(RealSessionService::new(
            verifier,
            issuer.clone(),
            store.clone(),
            clock.clone(),
            policy.clone(),
        ));
        let authorizer: Arc<dyn Authorizer> =
            Arc::new(AuthDecisionEngine::new(issuer, store, clock, policy));

        Self {
            session_service,
            authorizer,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
    }
}

pub fn session_policy(auth: &Auth) -> SessionPolicy {
    SessionPolicy {
        session_ttl: Duration::from_secs(auth.session_ttl_secs),
        lock_timeout: Duration::from_secs(auth.lock_timeout_secs),
        single_session: auth.single_session,
        rotate_refresh_tokens: auth.rotate_refresh_tokens,
        verifier_timeout: Duration::from_millis(auth.verifier_timeout_ms),
    }
}

fn credential_table(users: &[User]) -> HashMap<String, StoredCredential> {
    users
        .iter()
        .map(|user| {
            (
                user.username.clone(),
                StoredCredential {
                    user_id: UserId::from(user.user_id.as_str()),
                    password_hash: user.password_hash.clone(),
                },
            )
        })
        .collect()
}

fn signing_key(auth: &Auth) -> anyhow::Result<Vec<u8>> {
    match std::env::var(SIGNING_KEY_ENV) {
        Ok(key) if !key.is_empty() => return Ok(key.into_bytes()),
        Ok(_) | Err(std::env::VarError::NotPresent) => {}
        Err(e) => return Err(anyhow!("{SIGNING_KEY_ENV}: {e}")),
    }
    let key = auth.jwt_secret.expose();
    if key.is_empty() {
        bail!("no signing key: set {SIGNING_KEY_ENV} or auth.jwt_secret");
    }
    Ok(key.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_follows_auth_settings() {
        let auth = Auth {
            session_ttl_secs: 900,
            rotate_refresh_tokens: true,
            single_session: false,
            ..Auth::default()
        };
        let policy = session_policy(&auth);
        assert_eq!(policy.session_ttl, Duration::from_secs(900));
        assert_eq!(policy.lock_timeout, Duration::from_secs(600));
        assert_eq!(policy.verifier_timeout, Duration::from_millis(2000));
        assert!(policy.rotate_refresh_tokens);
        assert!(!policy.single_session);
    }

    #[test]
    fn users_are_keyed_by_username() {
        let table = credential_table(&[User {
            user_id: "42".to_string(),
            username: "alice".to_string(),
            password_hash: "phc".to_string(),
        }]);
        assert_eq!(table["alice"].user_id, UserId::from("42"));
    }
}
