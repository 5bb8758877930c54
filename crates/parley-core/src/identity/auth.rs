//! AuthApi and CredentialStore trait definitions.

use parley_types::error::ChatError;
use parley_types::identity::{Credentials, Identity, Registration, StoredCredentials, User};
use secrecy::SecretString;

/// Port for the CMS authentication endpoints.
///
/// Implementations live in parley-infra (e.g., `CmsClient`).
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for an identity. Rejected credentials yield
    /// `ChatError::Auth` carrying the server's message when it sent one.
    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<Identity, ChatError>> + Send;

    /// Register a new account and return its identity.
    fn sign_up(
        &self,
        registration: &Registration,
    ) -> impl std::future::Future<Output = Result<Identity, ChatError>> + Send;

    /// Resolve the profile behind a token (`/users/me`).
    fn current_user(
        &self,
        token: &SecretString,
    ) -> impl std::future::Future<Output = Result<User, ChatError>> + Send;
}

/// Port for persisting the signed-in identity between runs.
pub trait CredentialStore: Send + Sync {
    fn load(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<StoredCredentials>, ChatError>> + Send;

    fn save(
        &self,
        credentials: &StoredCredentials,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;

    /// Remove stored credentials. Clearing an empty store is not an error.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;
}
