use crate::application_impl::lock_controller::evict_session;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;

/// Paths a locked session may still reach.
const ALLOWED_WHILE_LOCKED: [&str; 3] = ["/unlock", "/check-session", "/logout"];

fn allowed_while_locked(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    ALLOWED_WHILE_LOCKED
        .iter()
        .any(|suffix| path.ends_with(suffix))
}

/// Exactly `Bearer <token>`, one space, nothing after the token.
fn bearer_token(header: &str) -> Option<&str> {
    match header.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => Some(token),
        _ => None,
    }
}

pub struct AuthDecisionEngine {
    issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl AuthDecisionEngine {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        AuthDecisionEngine {
            issuer,
            store,
            clock,
            policy,
        }
    }
}

#[async_trait::async_trait]
impl Authorizer for AuthDecisionEngine {
    async fn authorize(
        &self,
        authorization: Option<&str>,
        path: &str,
    ) -> Result<AuthDecision, AuthError> {
        let Some(header) = authorization.filter(|h| !h.is_empty()) else {
            return Ok(AuthDecision::Deny(DenyReason::MissingToken));
        };
        let Some(token) = bearer_token(header) else {
            return Ok(AuthDecision::Deny(DenyReason::InvalidTokenFormat));
        };

        let claims = match self.issuer.verify_token(token, TokenKind::Access).await {
            Ok(claims) => claims,
            Err(e) => {
                debug!(path, "access token rejected: {e}");
                return Ok(AuthDecision::Deny(DenyReason::InvalidOrExpiredToken));
            }
        };
        let user_id = &claims.identity.user_id;

        let session = self
            .store
            .get_session(user_id)
            .await
            .map_err(|e| AuthError::SessionCheckFailed(e.to_string()))?;
        let Some(session) = session else {
            return Ok(AuthDecision::Deny(DenyReason::SessionNotFound));
        };
        if self.policy.single_session && !session.is_bound_to(&claims.session_id) {
            debug!(%user_id, "token belongs to a superseded session");
            return Ok(AuthDecision::Deny(DenyReason::SessionNotFound));
        }

        if session.locked && !allowed_while_locked(path) {
            let timeout = self.policy.lock_timeout.as_secs() as i64;
            if session.lock_timed_out(self.clock.unix_now(), timeout) {
                evict_session(self.store.as_ref(), user_id)
                    .await
                    .map_err(|e| AuthError::SessionCheckFailed(e.to_string()))?;
                warn!(%user_id, "lock timed out, session evicted");
                return Ok(AuthDecision::Deny(DenyReason::LockTimeout));
            }
            return Ok(AuthDecision::Locked);
        }

        Ok(AuthDecision::Allow(claims.identity))
    }
}
