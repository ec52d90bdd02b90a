use crate::application_impl::credential_verifier_impl::verify_within;
use crate::application_impl::lock_controller::{LockController, evict_session};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

pub struct RealSessionService {
    verifier: Arc<dyn CredentialVerifier>,
    issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    locks: LockController,
}

impl RealSessionService {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        let locks = LockController::new(
            store.clone(),
            verifier.clone(),
            clock.clone(),
            policy.clone(),
        );
        RealSessionService {
            verifier,
            issuer,
            store,
            clock,
            policy,
            locks,
        }
    }
}

fn pair_error(err: TokenError, signing: fn(String) -> AuthError) -> AuthError {
    match err {
        TokenError::SigningFailed(e) => signing(e),
        TokenError::StoreWriteFailed(e) => AuthError::StoreWriteFailed(e.to_string()),
        other => AuthError::InternalError(other.to_string()),
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    async fn login(&self, input: LoginInput) -> Result<LoginResult, AuthError> {
        if input.username.is_empty() || input.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let verification = verify_within(
            self.verifier.as_ref(),
            &input.username,
            &input.password,
            self.policy.verifier_timeout,
        )
        .await?;
        let user_id = match verification {
            Verification::Verified(user_id) => user_id,
            Verification::UnknownUser | Verification::WrongPassword => {
                info!(username = %input.username, "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };
        let identity = Identity::new(user_id, input.username);

        if self.policy.single_session {
            evict_session(self.store.as_ref(), &identity.user_id)
                .await
                .map_err(|e| AuthError::SessionStorageFailed(e.to_string()))?;
        }

        let session_id = SessionId::generate();
        let tokens = self
            .issuer
            .issue_token_pair(&identity, &session_id)
            .await
            .map_err(|e| pair_error(e, AuthError::TokenGenerationFailed))?;

        let record = SessionRecord::new(
            identity.username.as_str(),
            self.clock.unix_now(),
            &input.meta,
            session_id,
        );
        if let Err(e) = self
            .store
            .create_or_replace_session(&identity.user_id, &record, self.policy.session_ttl)
            .await
        {
            // The refresh record must not outlive a login that never got a session.
            if let Err(cleanup) = self
                .store
                .delete_refresh_token(&identity.user_id, &tokens.refresh_token_id)
                .await
            {
                warn!(user_id = %identity.user_id, "orphaned refresh token left behind: {cleanup}");
            }
            return Err(AuthError::SessionStorageFailed(e.to_string()));
        }

        info!(user_id = %identity.user_id, ip = %record.ip, "login");
        Ok(LoginResult { identity, tokens })
    }

    async fn logout(&self, user_id: &UserId) -> Result<(), AuthError> {
        evict_session(self.store.as_ref(), user_id)
            .await
            .map_err(|e| AuthError::StoreWriteFailed(e.to_string()))?;
        info!(%user_id, "logout");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let claims = self
            .issuer
            .verify_token(refresh_token, TokenKind::Refresh)
            .await
            .map_err(|e| {
                debug!("refresh token rejected: {e}");
                AuthError::InvalidRefreshToken
            })?;
        let user_id = &claims.identity.user_id;

        let stored = self
            .store
            .get_refresh_token(user_id, &claims.token_id)
            .await
            .map_err(|e| AuthError::SessionRetrievalFailed(e.to_string()))?;
        if stored.as_deref() != Some(refresh_token) {
            info!(%user_id, "refresh token revoked or unknown");
            return Err(AuthError::RefreshTokenNotFound);
        }

        let session = self
            .store
            .get_session(user_id)
            .await
            .map_err(|e| AuthError::SessionRetrievalFailed(e.to_string()))?
            .ok_or(AuthError::SessionExpired)?;
        if self.policy.single_session && !session.is_bound_to(&claims.session_id) {
            return Err(AuthError::SessionExpired);
        }
        self.locks.enforce_timeout(user_id, &session).await?;

        if !self.policy.rotate_refresh_tokens {
            let (access_token, access_token_expires_at) = self
                .issuer
                .issue_access_token(&claims.identity, &claims.session_id)
                .await
                .map_err(|e| pair_error(e, AuthError::TokenSigningFailed))?;
            info!(%user_id, "access token refreshed");
            return Ok(RefreshResult {
                access_token,
                access_token_expires_at,
                refresh_token: None,
                refresh_token_expires_at: None,
            });
        }

        // The presented token is spent before its replacement exists. Only the
        // caller whose delete removed it may mint the next pair.
        let spent = self
            .store
            .delete_refresh_token(user_id, &claims.token_id)
            .await
            .map_err(|e| AuthError::StoreWriteFailed(e.to_string()))?;
        if !spent {
            info!(%user_id, "refresh token already spent");
            return Err(AuthError::RefreshTokenNotFound);
        }
        let pair = self
            .issuer
            .issue_token_pair(&claims.identity, &claims.session_id)
            .await
            .map_err(|e| pair_error(e, AuthError::TokenSigningFailed))?;
        info!(%user_id, "token pair rotated");
        Ok(RefreshResult {
            access_token: pair.access_token,
            access_token_expires_at: pair.access_token_expires_at,
            refresh_token: Some(pair.refresh_token),
            refresh_token_expires_at: Some(pair.refresh_token_expires_at),
        })
    }

    async fn lock(&self, user_id: &UserId) -> Result<LockResult, AuthError> {
        let locked_at = self.locks.lock(user_id).await?;
        Ok(LockResult { locked_at })
    }

    async fn unlock(&self, identity: &Identity, password: &str) -> Result<UnlockResult, AuthError> {
        let unlocked_at = self.locks.unlock(identity, password).await?;
        Ok(UnlockResult { unlocked_at })
    }

    async fn check_session(&self, user_id: &UserId) -> Result<SessionStatus, AuthError> {
        self.locks.check_session(user_id).await
    }

    async fn profile(&self, identity: &Identity) -> Result<Profile, AuthError> {
        let session = self
            .store
            .get_session(&identity.user_id)
            .await
            .map_err(|e| AuthError::SessionRetrievalFailed(e.to_string()))?
            .ok_or(AuthError::SessionNotFound)?;
        Ok(Profile {
            user: identity.clone(),
            session,
        })
    }
}
