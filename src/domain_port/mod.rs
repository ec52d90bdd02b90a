mod clock;
mod credential_verifier;
mod session_store;

pub use clock::*;
pub use credential_verifier::*;
pub use session_store::*;
