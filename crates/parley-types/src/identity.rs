//! Authenticated identity and the credential payloads that produce it.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// A CMS user profile as returned by sign-in, registration, and `/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
}

/// The authenticated user together with its bearer token.
///
/// At most one Identity is active per client instance; the identity gate
/// owns it. The token never appears in `Debug` output.
pub struct Identity {
    pub user: User,
    token: SecretString,
}

impl Identity {
    pub fn new(user: User, token: SecretString) -> Self {
        Self { user, token }
    }

    pub fn user_id(&self) -> u64 {
        self.user.id
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            token: SecretString::from(self.token.expose_secret().to_string()),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Sign-in form: identifier is an email or username.
pub struct Credentials {
    pub identifier: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Client-side check run before anything is submitted.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.identifier.trim().is_empty() {
            return Err(ChatError::Validation("email is required".to_string()));
        }
        if self.password.expose_secret().is_empty() {
            return Err(ChatError::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

/// Sign-up form.
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

impl Registration {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.username.trim().is_empty() {
            return Err(ChatError::Validation("username is required".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(ChatError::Validation("email is required".to_string()));
        }
        if !email.contains('@') {
            return Err(ChatError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }
        if self.password.expose_secret().is_empty() {
            return Err(ChatError::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

/// Result of sign-in / sign-up at the gate. Failures carry a non-empty,
/// user-displayable message instead of an error value.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Success(Identity),
    Failure { message: String },
}

impl AuthOutcome {
    pub fn failure(err: &ChatError) -> Self {
        AuthOutcome::Failure {
            message: err.user_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Success(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Success(identity) => Some(identity),
            AuthOutcome::Failure { .. } => None,
        }
    }
}

/// On-disk form of a signed-in identity (local credential storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: String,
    pub user: User,
}

impl From<&Identity> for StoredCredentials {
    fn from(identity: &Identity) -> Self {
        Self {
            token: identity.token.expose_secret().to_string(),
            user: identity.user.clone(),
        }
    }
}

impl From<StoredCredentials> for Identity {
    fn from(stored: StoredCredentials) -> Self {
        Identity::new(stored.user, SecretString::from(stored.token))
    }
}
