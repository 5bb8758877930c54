//! Identity gate: sign-in, sign-up, restore, and logout, plus the ports
//! for the auth API and local credential storage.

pub mod auth;
pub mod gate;

pub use auth::{AuthApi, CredentialStore};
pub use gate::IdentityGate;
