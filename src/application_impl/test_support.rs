use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::{ManualClock, MemorySessionStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Memory store whose reads and writes can be made to fail on demand, or to
/// yield after reads so concurrent callers interleave.
pub struct FlakyStore {
    inner: MemorySessionStore,
    fail_refresh_writes: AtomicBool,
    fail_session_writes: AtomicBool,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
    yield_after_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        FlakyStore {
            inner: MemorySessionStore::new(clock),
            fail_refresh_writes: AtomicBool::new(false),
            fail_session_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            yield_after_reads: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemorySessionStore {
        &self.inner
    }

    pub fn fail_refresh_writes(&self, on: bool) {
        self.fail_refresh_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_session_writes(&self, on: bool) {
        self.fail_session_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    pub fn yield_after_reads(&self, on: bool) {
        self.yield_after_reads.store(on, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yield_after_reads.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SessionStore for FlakyStore {
    async fn create_or_replace_session(
        &self,
        user_id: &UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        Self::check(&self.fail_session_writes)?;
        self.inner
            .create_or_replace_session(user_id, record, ttl)
            .await
    }

    async fn get_session(&self, user_id: &UserId) -> Result<Option<SessionRecord>, StoreError> {
        Self::check(&self.fail_reads)?;
        let found = self.inner.get_session(user_id).await;
        self.maybe_yield().await;
        found
    }

    async fn update_session(
        &self,
        user_id: &UserId,
        patch: SessionPatch,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        Self::check(&self.fail_session_writes)?;
        self.inner.update_session(user_id, patch, ttl).await
    }

    async fn delete_session(&self, user_id: &UserId) -> Result<(), StoreError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_session(user_id).await
    }

    async fn put_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        Self::check(&self.fail_refresh_writes)?;
        self.inner
            .put_refresh_token(user_id, token_id, token, ttl)
            .await
    }

    async fn get_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<Option<String>, StoreError> {
        Self::check(&self.fail_reads)?;
        let found = self.inner.get_refresh_token(user_id, token_id).await;
        self.maybe_yield().await;
        found
    }

    async fn delete_refresh_token(
        &self,
        user_id: &UserId,
        token_id: &str,
    ) -> Result<bool, StoreError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_refresh_token(user_id, token_id).await
    }

    async fn delete_all_refresh_tokens(&self, user_id: &UserId) -> Result<usize, StoreError> {
        Self::check(&self.fail_deletes)?;
        self.inner.delete_all_refresh_tokens(user_id).await
    }
}

/// Everything wired over a manual clock and a flaky memory store.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlakyStore>,
    pub service: RealSessionService,
    pub engine: AuthDecisionEngine,
    locks: LockController,
}

impl Harness {
    pub fn new(policy: SessionPolicy) -> Self {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let store = Arc::new(FlakyStore::new(clock.clone()));
        let verifier = Arc::new(FakeCredentialVerifier::new());
        let issuer = Arc::new(JwtTokenIssuer::new(
            JwtConfig {
                issuer: "sessiongate.test".to_string(),
                audience: "api".to_string(),
                access_ttl: Duration::from_secs(15 * 60),
                refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
                signing_key: b"harness-key".to_vec(),
            },
            clock.clone(),
            store.clone(),
        ));

        let service = RealSessionService::new(
            verifier.clone(),
            issuer.clone(),
            store.clone(),
            clock.clone(),
            policy.clone(),
        );
        let engine = AuthDecisionEngine::new(
            issuer.clone(),
            store.clone(),
            clock.clone(),
            policy.clone(),
        );
        let locks = LockController::new(store.clone(), verifier, clock.clone(), policy);

        Harness {
            clock,
            store,
            service,
            engine,
            locks,
        }
    }

    pub fn locks(&self) -> &LockController {
        &self.locks
    }

    pub async fn login(&self, username: &str) -> LoginResult {
        self.service
            .login(LoginInput {
                username: username.to_string(),
                password: "password".to_string(),
                meta: RequestMeta {
                    ip: "127.0.0.1".to_string(),
                    user_agent: "harness".to_string(),
                },
            })
            .await
            .unwrap()
    }

    pub async fn authorize(&self, access_token: &AccessToken, path: &str) -> AuthDecision {
        let header = format!("Bearer {}", access_token.0);
        self.engine.authorize(Some(&header), path).await.unwrap()
    }
}
