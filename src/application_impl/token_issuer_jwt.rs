use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{Clock, SessionStore};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: String,
    username: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
    sid: String,
    typ: TokenKind,
}

/// HS256 tokens. Expiry is judged against the injected clock rather than the
/// library's own view of the time.
pub struct JwtTokenIssuer {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SessionStore>,
}

impl JwtTokenIssuer {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>, store: Arc<dyn SessionStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_audience(&[cfg.audience.clone()]);
        validation.set_issuer(&[cfg.issuer.clone()]);

        JwtTokenIssuer {
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            cfg,
            clock,
            store,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn sign(
        &self,
        identity: &Identity,
        session_id: &SessionId,
        kind: TokenKind,
        jti: String,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        };
        let expires_at = issued_at + ttl;
        let claims = Claims {
            user_id: identity.user_id.0.clone(),
            username: identity.username.clone(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti,
            sid: session_id.0.clone(),
            typ: kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::SigningFailed(e.to_string()))?;
        Ok((token, expires_at))
    }
}

#[async_trait::async_trait]
impl TokenIssuer for JwtTokenIssuer {
    async fn issue_token_pair(
        &self,
        identity: &Identity,
        session_id: &SessionId,
    ) -> Result<TokenPair, TokenError> {
        let now = self.clock.now();
        let (access_token, access_exp) =
            self.sign(identity, session_id, TokenKind::Access, Self::gen_jti(), now)?;

        let refresh_id = Self::gen_jti();
        let (refresh_token, refresh_exp) = self.sign(
            identity,
            session_id,
            TokenKind::Refresh,
            refresh_id.clone(),
            now,
        )?;

        self.store
            .put_refresh_token(
                &identity.user_id,
                &refresh_id,
                &refresh_token,
                self.cfg.refresh_ttl,
            )
            .await?;

        Ok(TokenPair {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
            refresh_token_id: refresh_id,
        })
    }

    async fn issue_access_token(
        &self,
        identity: &Identity,
        session_id: &SessionId,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError> {
        let (token, exp) = self.sign(
            identity,
            session_id,
            TokenKind::Access,
            Self::gen_jti(),
            self.clock.now(),
        )?;
        Ok((AccessToken(token), exp))
    }

    async fn verify_token(
        &self,
        token: &str,
        expected: TokenKind,
    ) -> Result<VerifiedClaims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::TokenInvalid)?
            .claims;

        if claims.typ != expected {
            return Err(TokenError::TokenInvalid);
        }
        if self.clock.unix_now() >= claims.exp {
            return Err(TokenError::TokenExpired);
        }

        Ok(VerifiedClaims {
            identity: Identity::new(claims.user_id, claims.username),
            kind: claims.typ,
            token_id: claims.jti,
            session_id: SessionId(claims.sid),
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}
