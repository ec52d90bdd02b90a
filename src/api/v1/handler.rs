use super::error::rejection;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Reply;

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub async fn health() -> Result<impl Reply, warp::Rejection> {
    #[derive(Serialize)]
    struct Health {
        status: &'static str,
    }
    Ok(warp::reply::json(&Health { status: "ok" }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: AccessToken,
    refresh_token: RefreshToken,
    access_token_expires_at: DateTime<Utc>,
    refresh_token_expires_at: DateTime<Utc>,
    user: Identity,
}

pub async fn login(
    body: LoginRequest,
    meta: RequestMeta,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let input = LoginInput {
        username: body.username,
        password: body.password,
        meta,
    };
    let result = session_service.login(input).await.map_err(rejection)?;

    let response = LoginResponse {
        access_token: result.tokens.access_token,
        refresh_token: result.tokens.refresh_token,
        access_token_expires_at: result.tokens.access_token_expires_at,
        refresh_token_expires_at: result.tokens.refresh_token_expires_at,
        user: result.identity,
    };
    Ok(warp::reply::json(&response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let result = session_service
        .refresh(&body.refresh_token)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&result))
}

pub async fn logout(
    identity: Identity,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    session_service
        .logout(&identity.user_id)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&MessageResponse {
        message: "Logged out successfully",
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockResponse {
    message: &'static str,
    locked_at: i64,
}

pub async fn lock(
    identity: Identity,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let result = session_service
        .lock(&identity.user_id)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&LockResponse {
        message: "Session locked",
        locked_at: result.locked_at,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockResponse {
    message: &'static str,
    unlocked_at: i64,
}

pub async fn unlock(
    identity: Identity,
    body: UnlockRequest,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let result = session_service
        .unlock(&identity, &body.password)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&UnlockResponse {
        message: "Session unlocked",
        unlocked_at: result.unlocked_at,
    }))
}

pub async fn check_session(
    identity: Identity,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let status = session_service
        .check_session(&identity.user_id)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUser {
    user_id: UserId,
    username: String,
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    user: ProfileUser,
    session: SessionRecord,
}

pub async fn profile(
    identity: Identity,
    session_service: Arc<dyn SessionService>,
) -> Result<impl Reply, warp::Rejection> {
    let profile = session_service
        .profile(&identity)
        .await
        .map_err(rejection)?;
    Ok(warp::reply::json(&ProfileResponse {
        user: ProfileUser {
            user_id: profile.user.user_id,
            username: profile.user.username,
        },
        session: profile.session,
    }))
}
