use sessiongate::application_impl::FakeCredentialVerifier;
use sessiongate::application_port::*;
use sessiongate::domain_model::*;
use sessiongate::domain_port::Clock;
use sessiongate::infra_memory::{ManualClock, MemorySessionStore};
use sessiongate::server::Server;
use sessiongate::settings::Auth;
use std::sync::Arc;
use std::time::Duration;

const T0: i64 = 1_700_000_000;

struct Fixture {
    clock: Arc<ManualClock>,
    store: Arc<MemorySessionStore>,
    server: Server,
}

impl Fixture {
    fn new(auth: Auth) -> Self {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let store = Arc::new(MemorySessionStore::new(clock.clone()));
        let server = Server::assemble(
            &auth,
            store.clone(),
            Arc::new(FakeCredentialVerifier::new()),
            clock.clone(),
            b"integration-key".to_vec(),
        );
        Fixture {
            clock,
            store,
            server,
        }
    }

    fn standard() -> Self {
        Self::new(Auth::default())
    }

    async fn login(&self, username: &str) -> LoginResult {
        self.server
            .session_service
            .login(LoginInput {
                username: username.to_string(),
                password: "password".to_string(),
                meta: RequestMeta {
                    ip: "192.0.2.10".to_string(),
                    user_agent: "lifecycle-test".to_string(),
                },
            })
            .await
            .unwrap()
    }

    async fn authorize(&self, token: &AccessToken, path: &str) -> AuthDecision {
        let header = format!("Bearer {}", token.0);
        self.server
            .authorizer
            .authorize(Some(&header), path)
            .await
            .unwrap()
    }

    fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }
}

#[tokio::test]
async fn token_lifetimes_are_fifteen_minutes_and_seven_days() {
    let f = Fixture::standard();
    let login = f.login("user1").await;

    assert_eq!(login.tokens.access_token_expires_at.timestamp(), T0 + 15 * 60);
    assert_eq!(
        login.tokens.refresh_token_expires_at.timestamp(),
        T0 + 7 * 24 * 60 * 60
    );

    f.advance(15 * 60 - 1);
    assert!(matches!(
        f.authorize(&login.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(_)
    ));
    f.advance(1);
    assert_eq!(
        f.authorize(&login.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Deny(DenyReason::InvalidOrExpiredToken)
    );
}

#[tokio::test]
async fn fresh_access_token_is_allowed_with_its_identity() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    assert_eq!(login.identity, Identity::new("1", "user1"));
    assert_eq!(
        f.authorize(&login.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(Identity::new("1", "user1"))
    );
}

#[tokio::test]
async fn logout_twice_succeeds() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    let uid = login.identity.user_id;

    f.server.session_service.logout(&uid).await.unwrap();
    f.server.session_service.logout(&uid).await.unwrap();
    assert!(f.store.get_session_now(&uid).is_none());
    assert_eq!(f.store.live_refresh_tokens(&uid), 0);
}

#[tokio::test]
async fn second_login_supersedes_the_first() {
    let f = Fixture::standard();
    let first = f.login("user1").await;
    let second = f.login("user1").await;

    assert_eq!(
        f.authorize(&first.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Deny(DenyReason::SessionNotFound)
    );
    assert!(matches!(
        f.authorize(&second.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(_)
    ));

    let err = f
        .server
        .session_service
        .refresh(&first.tokens.refresh_token.0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REFRESH_TOKEN_NOT_FOUND");
    assert_eq!(f.store.live_refresh_tokens(&"1".into()), 1);
}

#[tokio::test]
async fn without_single_session_both_logins_stay_valid() {
    let f = Fixture::new(Auth {
        single_session: false,
        ..Auth::default()
    });
    let first = f.login("user1").await;
    let second = f.login("user1").await;

    for tokens in [&first.tokens, &second.tokens] {
        assert!(matches!(
            f.authorize(&tokens.access_token, "/api/v1/auth/profile").await,
            AuthDecision::Allow(_)
        ));
    }
    assert_eq!(f.store.live_refresh_tokens(&"1".into()), 2);
    f.server
        .session_service
        .refresh(&first.tokens.refresh_token.0)
        .await
        .unwrap();
}

#[tokio::test]
async fn unlock_within_the_timeout() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    let service = &f.server.session_service;

    let locked = service.lock(&login.identity.user_id).await.unwrap();
    assert_eq!(locked.locked_at, T0);

    f.advance(300);
    let status = service
        .check_session(&login.identity.user_id)
        .await
        .unwrap();
    assert_eq!(status.time_remaining, Some(300));

    let unlocked = service.unlock(&login.identity, "password").await.unwrap();
    assert_eq!(unlocked.unlocked_at, T0 + 300);
    assert!(matches!(
        f.authorize(&login.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(_)
    ));
}

#[tokio::test]
async fn unlock_after_the_timeout_evicts_the_session() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    let uid = login.identity.user_id.clone();
    let service = &f.server.session_service;

    service.lock(&uid).await.unwrap();
    f.advance(601);

    let err = service.unlock(&login.identity, "password").await.unwrap_err();
    assert_eq!(err.code(), "LOCK_TIMEOUT");
    assert!(f.store.get_session_now(&uid).is_none());
    assert_eq!(f.store.live_refresh_tokens(&uid), 0);

    assert_eq!(
        f.authorize(&login.tokens.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Deny(DenyReason::SessionNotFound)
    );
}

#[tokio::test]
async fn lock_lasting_exactly_the_timeout_can_still_be_unlocked() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    f.server
        .session_service
        .lock(&login.identity.user_id)
        .await
        .unwrap();

    f.advance(600);
    f.server
        .session_service
        .unlock(&login.identity, "password")
        .await
        .unwrap();
}

#[tokio::test]
async fn refresh_after_logout_is_not_found() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    f.server
        .session_service
        .logout(&login.identity.user_id)
        .await
        .unwrap();

    let err = f
        .server
        .session_service
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "REFRESH_TOKEN_NOT_FOUND");
}

#[tokio::test]
async fn locked_session_only_reaches_the_allow_list() {
    let f = Fixture::standard();
    let login = f.login("user1").await;
    f.server
        .session_service
        .lock(&login.identity.user_id)
        .await
        .unwrap();

    for path in [
        "/api/v1/auth/unlock",
        "/api/v1/auth/check-session",
        "/api/v1/auth/logout",
    ] {
        assert_eq!(
            f.authorize(&login.tokens.access_token, path).await,
            AuthDecision::Allow(login.identity.clone()),
            "{path}"
        );
    }

    let decision = f
        .authorize(&login.tokens.access_token, "/api/v1/auth/profile")
        .await;
    assert_eq!(decision, AuthDecision::Locked);
    let err = decision.into_result().unwrap_err();
    assert_eq!(err.code(), "SESSION_LOCKED");
    assert_eq!(err.status(), ErrorClass::Forbidden);
}

#[tokio::test]
async fn malformed_and_missing_headers() {
    let f = Fixture::standard();
    let authorizer = &f.server.authorizer;
    assert_eq!(
        authorizer.authorize(Some("Token abc"), "/x").await.unwrap(),
        AuthDecision::Deny(DenyReason::InvalidTokenFormat)
    );
    assert_eq!(
        authorizer.authorize(None, "/x").await.unwrap(),
        AuthDecision::Deny(DenyReason::MissingToken)
    );
}

#[tokio::test]
async fn short_session_ttl_ends_the_session_after_fifteen_minutes() {
    let f = Fixture::new(Auth {
        session_ttl_secs: 15 * 60,
        ..Auth::default()
    });
    let login = f.login("user1").await;

    f.advance(14 * 60);
    let refreshed = f
        .server
        .session_service
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap();

    f.advance(60);
    assert_eq!(
        f.authorize(&refreshed.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Deny(DenyReason::SessionNotFound)
    );
    let err = f
        .server
        .session_service
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SESSION_EXPIRED");
}

#[tokio::test]
async fn lock_rearms_the_short_session_ttl() {
    let f = Fixture::new(Auth {
        session_ttl_secs: 15 * 60,
        ..Auth::default()
    });
    let login = f.login("user1").await;
    let uid = login.identity.user_id.clone();

    f.advance(10 * 60);
    f.server.session_service.lock(&uid).await.unwrap();
    f.advance(9 * 60);
    assert!(f.store.get_session_now(&uid).is_some());
}

#[tokio::test]
async fn default_session_ttl_outlives_the_access_token() {
    let f = Fixture::standard();
    let login = f.login("user1").await;

    f.advance(24 * 60 * 60);
    let refreshed = f
        .server
        .session_service
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap();
    assert!(refreshed.refresh_token.is_none());
    assert_eq!(
        f.authorize(&refreshed.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(login.identity.clone())
    );
}

#[tokio::test]
async fn rotation_returns_a_new_pair_bound_to_the_same_session() {
    let f = Fixture::new(Auth {
        rotate_refresh_tokens: true,
        ..Auth::default()
    });
    let login = f.login("user1").await;

    f.advance(60);
    let rotated = f
        .server
        .session_service
        .refresh(&login.tokens.refresh_token.0)
        .await
        .unwrap();
    let next = rotated.refresh_token.expect("rotated refresh token");
    assert_eq!(
        rotated.refresh_token_expires_at.map(|at| at.timestamp()),
        Some(f.clock.unix_now() + 7 * 24 * 60 * 60)
    );

    assert_eq!(
        f.authorize(&rotated.access_token, "/api/v1/auth/profile")
            .await,
        AuthDecision::Allow(login.identity.clone())
    );
    assert_eq!(
        f.server
            .session_service
            .refresh(&login.tokens.refresh_token.0)
            .await
            .unwrap_err()
            .code(),
        "REFRESH_TOKEN_NOT_FOUND"
    );
    f.server.session_service.refresh(&next.0).await.unwrap();
}
