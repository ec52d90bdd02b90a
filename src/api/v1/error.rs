use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, Reply, reject};

/// Wire shape of every failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    fn into_reply(self) -> warp::reply::WithStatus<warp::reply::Json> {
        let body = ErrorBody {
            error_code: self.code,
            message: self.message,
        };
        warp::reply::with_status(warp::reply::json(&body), self.status)
    }
}

impl reject::Reject for ApiError {}

pub fn status_of(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorClass::Forbidden => StatusCode::FORBIDDEN,
        ErrorClass::ServerFault => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let class = error.status();
        if class == ErrorClass::ServerFault {
            warn!(code = error.code(), "request failed: {}", error);
        }
        ApiError::new(status_of(class), error.code(), error.public_message())
    }
}

pub(super) fn rejection(error: AuthError) -> Rejection {
    reject::custom(ApiError::from(error))
}

pub async fn recover_error(err: Rejection) -> Result<impl Reply, Infallible> {
    let api_error = if let Some(e) = err.find::<ApiError>() {
        e.clone()
    } else if err.is_not_found() {
        ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        warn!("malformed request body: {}", e);
        ApiError::from(AuthError::InvalidRequest(e.to_string()))
    } else if err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
    {
        ApiError::from(AuthError::InvalidRequest(format!("{:?}", err)))
    } else if err.find::<reject::InvalidHeader>().is_some() {
        ApiError::from(AuthError::InvalidTokenFormat)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "METHOD_NOT_ALLOWED",
            "Method not allowed",
        )
    } else {
        warn!("unhandled rejection: {:?}", err);
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal error",
        )
    };
    Ok(api_error.into_reply())
}
