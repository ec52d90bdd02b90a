use super::error::rejection;
use super::handler;
use crate::application_port::*;
use crate::domain_model::*;
use crate::server::*;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::filters::path::FullPath;
use warp::http::HeaderMap;
use warp::{Filter, http};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handler::health);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(json_body::<handler::LoginRequest>())
        .and(with_request_meta())
        .and(with(server.session_service.clone()))
        .and_then(handler::login);

    let refresh = warp::path!("auth" / "refresh-token")
        .and(warp::post())
        .and(json_body::<handler::RefreshRequest>())
        .and(with(server.session_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(with_identity(server.authorizer.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::logout);

    let lock = warp::path!("auth" / "lock")
        .and(warp::post())
        .and(with_identity(server.authorizer.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::lock);

    let unlock = warp::path!("auth" / "unlock")
        .and(warp::post())
        .and(with_identity(server.authorizer.clone()))
        .and(json_body::<handler::UnlockRequest>())
        .and(with(server.session_service.clone()))
        .and_then(handler::unlock);

    let check_session = warp::path!("auth" / "check-session")
        .and(warp::get())
        .and(with_identity(server.authorizer.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::check_session);

    let profile = warp::path!("auth" / "profile")
        .and(warp::get())
        .and(with_identity(server.authorizer.clone()))
        .and(with(server.session_service.clone()))
        .and_then(handler::profile);

    health
        .or(login)
        .or(refresh)
        .or(logout)
        .or(lock)
        .or(unlock)
        .or(check_session)
        .or(profile)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Client address and user agent as recorded in the session.
fn with_request_meta() -> impl Filter<Extract = (RequestMeta,), Error = Infallible> + Clone {
    warp::addr::remote().and(warp::header::headers_cloned()).map(
        |remote: Option<SocketAddr>, headers: HeaderMap| {
            let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
            let forwarded = header("x-forwarded-for")
                .and_then(|list| list.split(',').next())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string);
            RequestMeta {
                ip: forwarded
                    .or_else(|| remote.map(|addr| addr.ip().to_string()))
                    .unwrap_or_default(),
                user_agent: header(http::header::USER_AGENT.as_str())
                    .unwrap_or_default()
                    .to_string(),
            }
        },
    )
}

/// Ratify the bearer token against the session store for the requested path.
fn with_identity(
    authorizer: Arc<dyn Authorizer>,
) -> impl Filter<Extract = (Identity,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str())
        .and(warp::path::full())
        .and_then(move |header: Option<String>, path: FullPath| {
            let authorizer = authorizer.clone();
            async move {
                authorizer
                    .authorize(header.as_deref(), path.as_str())
                    .await
                    .and_then(AuthDecision::into_result)
                    .map_err(rejection)
            }
        })
}
