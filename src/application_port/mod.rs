mod auth_service;
mod authorizer;
mod token_issuer;

pub use auth_service::*;
pub use authorizer::*;
pub use token_issuer::*;
