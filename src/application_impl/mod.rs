mod auth_decision_engine;
mod credential_verifier_impl;
mod lock_controller;
mod session_service_impl;
mod token_issuer_jwt;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_decision_engine::*;
pub use credential_verifier_impl::*;
pub use lock_controller::*;
pub use session_service_impl::*;
pub use token_issuer_jwt::*;
