use crate::application_impl::credential_verifier_impl::verify_within;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

/// Drop every refresh token and then the session record of `user_id`.
pub(crate) async fn evict_session(
    store: &dyn SessionStore,
    user_id: &UserId,
) -> Result<(), StoreError> {
    let revoked = store.delete_all_refresh_tokens(user_id).await?;
    store.delete_session(user_id).await?;
    debug!(%user_id, revoked, "session evicted");
    Ok(())
}

/// Screen-lock style suspension of a session.
///
/// The lock timeout is only evaluated when something touches the session;
/// nothing sweeps stale locks in the background.
pub struct LockController {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn CredentialVerifier>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl LockController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            policy,
        }
    }

    fn timeout_secs(&self) -> i64 {
        self.policy.lock_timeout.as_secs() as i64
    }

    /// The error to hand back once a timed-out lock has been dealt with.
    async fn evict_on_timeout(&self, user_id: &UserId) -> AuthError {
        match evict_session(self.store.as_ref(), user_id).await {
            Ok(()) => {
                warn!(%user_id, "lock timed out, session evicted");
                AuthError::LockTimeout
            }
            Err(e) => AuthError::StoreWriteFailed(e.to_string()),
        }
    }

    /// Locking an already locked session moves `lockedAt` forward.
    pub async fn lock(&self, user_id: &UserId) -> Result<i64, AuthError> {
        let locked_at = self.clock.unix_now();
        let updated = self
            .store
            .update_session(
                user_id,
                SessionPatch::Lock { locked_at },
                self.policy.session_ttl,
            )
            .await
            .map_err(|e| AuthError::SessionStorageFailed(e.to_string()))?;
        if !updated {
            return Err(AuthError::SessionNotFound);
        }
        info!(%user_id, locked_at, "session locked");
        Ok(locked_at)
    }

    pub async fn unlock(&self, identity: &Identity, password: &str) -> Result<i64, AuthError> {
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }
        let user_id = &identity.user_id;

        let session = self
            .store
            .get_session(user_id)
            .await
            .map_err(|e| AuthError::SessionRetrievalFailed(e.to_string()))?
            .ok_or(AuthError::SessionNotFound)?;
        if !session.locked {
            return Err(AuthError::SessionNotLocked);
        }

        let now = self.clock.unix_now();
        if session.lock_timed_out(now, self.timeout_secs()) {
            return Err(self.evict_on_timeout(user_id).await);
        }

        match verify_within(
            self.verifier.as_ref(),
            &identity.username,
            password,
            self.policy.verifier_timeout,
        )
        .await?
        {
            Verification::Verified(verified) if verified == *user_id => {}
            Verification::Verified(_) | Verification::WrongPassword => {
                info!(%user_id, "unlock rejected");
                return Err(AuthError::InvalidPassword);
            }
            Verification::UnknownUser => return Err(AuthError::UserNotFound),
        }

        let unlocked_at = self.clock.unix_now();
        let updated = self
            .store
            .update_session(
                user_id,
                SessionPatch::Unlock { unlocked_at },
                self.policy.session_ttl,
            )
            .await
            .map_err(|e| AuthError::SessionStorageFailed(e.to_string()))?;
        if !updated {
            return Err(AuthError::SessionNotFound);
        }
        info!(%user_id, unlocked_at, "session unlocked");
        Ok(unlocked_at)
    }

    pub async fn check_session(&self, user_id: &UserId) -> Result<SessionStatus, AuthError> {
        let session = self
            .store
            .get_session(user_id)
            .await
            .map_err(|e| AuthError::SessionCheckFailed(e.to_string()))?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.locked {
            return Ok(SessionStatus {
                locked: false,
                locked_at: None,
                time_remaining: None,
            });
        }

        let now = self.clock.unix_now();
        if session.lock_timed_out(now, self.timeout_secs()) {
            return Err(self.evict_on_timeout(user_id).await);
        }

        Ok(SessionStatus {
            locked: true,
            locked_at: session.locked_at,
            time_remaining: session
                .lock_duration(now)
                .map(|elapsed| (self.timeout_secs() - elapsed).max(0)),
        })
    }

    /// Evict if `session` sits in a lock older than the timeout. Used by callers
    /// that already hold the record.
    pub(crate) async fn enforce_timeout(
        &self,
        user_id: &UserId,
        session: &SessionRecord,
    ) -> Result<(), AuthError> {
        if session.lock_timed_out(self.clock.unix_now(), self.timeout_secs()) {
            return Err(self.evict_on_timeout(user_id).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::application_impl::test_support::Harness;
    use crate::application_port::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lock_requires_a_session() {
        let h = Harness::new(SessionPolicy::default());
        let err = h.locks().lock(&"1".into()).await.unwrap_err();
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
        assert!(h.store.inner().get_session_now(&"1".into()).is_none());
    }

    #[tokio::test]
    async fn relock_refreshes_locked_at() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;
        let uid = login.identity.user_id.clone();

        let first = h.locks().lock(&uid).await.unwrap();
        h.clock.advance(Duration::from_secs(500));
        let second = h.locks().lock(&uid).await.unwrap();
        assert_eq!(second - first, 500);

        h.clock.advance(Duration::from_secs(500));
        let status = h.locks().check_session(&uid).await.unwrap();
        assert!(status.locked);
        assert_eq!(status.locked_at, Some(second));
        assert_eq!(status.time_remaining, Some(100));
    }

    #[tokio::test]
    async fn unlock_needs_locked_session_and_password() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;

        let err = h.locks().unlock(&login.identity, "").await.unwrap_err();
        assert_eq!(err.code(), "MISSING_PASSWORD");

        let err = h
            .locks()
            .unlock(&login.identity, "password")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SESSION_NOT_LOCKED");
    }

    #[tokio::test]
    async fn wrong_password_keeps_session_locked() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;
        let uid = login.identity.user_id.clone();
        h.locks().lock(&uid).await.unwrap();

        let err = h.locks().unlock(&login.identity, "guess").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PASSWORD");
        assert!(h.locks().check_session(&uid).await.unwrap().locked);

        h.locks().unlock(&login.identity, "password").await.unwrap();
        let session = h.store.inner().get_session_now(&uid).unwrap();
        assert!(!session.locked);
        assert_eq!(session.locked_at, None);
        assert!(session.unlocked_at.is_some());
    }

    #[tokio::test]
    async fn unknown_user_during_unlock() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;
        h.locks().lock(&login.identity.user_id).await.unwrap();

        let renamed = crate::domain_model::Identity::new("1", "ghost");
        let err = h.locks().unlock(&renamed, "password").await.unwrap_err();
        assert_eq!(err.code(), "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn check_session_evicts_expired_lock() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;
        let uid = login.identity.user_id.clone();
        h.locks().lock(&uid).await.unwrap();

        h.clock.advance(Duration::from_secs(601));
        let err = h.locks().check_session(&uid).await.unwrap_err();
        assert_eq!(err.code(), "LOCK_TIMEOUT");
        assert!(h.store.inner().get_session_now(&uid).is_none());
        assert_eq!(h.store.inner().live_refresh_tokens(&uid), 0);
    }

    #[tokio::test]
    async fn unlocked_session_reports_no_timer() {
        let h = Harness::new(SessionPolicy::default());
        let login = h.login("user1").await;
        let status = h
            .locks()
            .check_session(&login.identity.user_id)
            .await
            .unwrap();
        assert_eq!(
            status,
            SessionStatus {
                locked: false,
                locked_at: None,
                time_remaining: None
            }
        );
    }
}
