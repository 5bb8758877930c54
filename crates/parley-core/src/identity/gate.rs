//! Identity gate: the single source of truth for who is signed in.
//!
//! Establishing an identity persists its token and starts the real-time
//! channel; logging out tears both down. Failures come back as
//! `AuthOutcome::Failure` with displayable text, never as panics.

use std::sync::{Arc, PoisonError, RwLock};

use parley_types::error::ChatError;
use parley_types::identity::{AuthOutcome, Credentials, Identity, Registration, StoredCredentials};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use super::auth::{AuthApi, CredentialStore};
use crate::channel::{ChannelManager, Transport};

pub struct IdentityGate<A: AuthApi, C: CredentialStore, T: Transport> {
    auth: A,
    credentials: C,
    channel: Arc<ChannelManager<T>>,
    current: RwLock<Option<Identity>>,
    autostart_channel: bool,
}

impl<A: AuthApi, C: CredentialStore, T: Transport> IdentityGate<A, C, T> {
    pub fn new(auth: A, credentials: C, channel: Arc<ChannelManager<T>>) -> Self {
        Self {
            auth,
            credentials,
            channel,
            current: RwLock::new(None),
            autostart_channel: true,
        }
    }

    /// Whether establishing an identity starts the channel right away.
    ///
    /// One-shot commands turn this off and call
    /// [`connect_channel`](Self::connect_channel) only when they need it.
    pub fn with_channel_autostart(mut self, enabled: bool) -> Self {
        self.autostart_channel = enabled;
        self
    }

    pub fn channel(&self) -> &Arc<ChannelManager<T>> {
        &self.channel
    }

    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The active identity, or `ChatError::Auth` when nobody is signed in.
    pub fn require(&self) -> Result<Identity, ChatError> {
        self.current()
            .ok_or_else(|| ChatError::Auth("not signed in".to_string()))
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> AuthOutcome {
        if let Err(e) = credentials.validate() {
            return AuthOutcome::failure(&e);
        }
        match self.auth.sign_in(credentials).await {
            Ok(identity) => {
                info!(user_id = identity.user_id(), "Signed in");
                self.establish(identity).await
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                AuthOutcome::failure(&e)
            }
        }
    }

    pub async fn sign_up(&self, registration: &Registration) -> AuthOutcome {
        if let Err(e) = registration.validate() {
            return AuthOutcome::failure(&e);
        }
        match self.auth.sign_up(registration).await {
            Ok(identity) => {
                info!(user_id = identity.user_id(), "Account registered");
                self.establish(identity).await
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                AuthOutcome::failure(&e)
            }
        }
    }

    /// Re-establish the identity from stored credentials.
    ///
    /// The stored token is validated against the CMS. A rejected token is
    /// cleared; a network failure keeps it for the next attempt.
    pub async fn restore_session(&self) -> Option<Identity> {
        if let Some(identity) = self.current() {
            return Some(identity);
        }
        let stored = match self.credentials.load().await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                debug!("No stored credentials");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                return None;
            }
        };

        let token = SecretString::from(stored.token);
        match self.auth.current_user(&token).await {
            Ok(user) => {
                info!(user_id = user.id, "Session restored");
                let identity = Identity::new(user, token);
                self.establish(identity).await.identity().cloned()
            }
            Err(e) if e.is_auth() => {
                info!("Stored session is no longer valid");
                if let Err(e) = self.credentials.clear().await {
                    warn!(error = %e, "Failed to clear stored credentials");
                }
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not validate stored session");
                None
            }
        }
    }

    /// Clear the identity, stored credentials, and the channel connection.
    ///
    /// Always completes; a storage failure is only logged.
    pub async fn logout(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.channel.shutdown().await;
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        match previous {
            Some(identity) => info!(user_id = identity.user_id(), "Signed out"),
            None => debug!("Logout with no active identity"),
        }
    }

    /// Start the channel for the current identity if it is not running.
    pub async fn connect_channel(&self) -> Result<(), ChatError> {
        let identity = self.require()?;
        if !self.channel.is_started() {
            self.channel.start(identity).await;
        }
        Ok(())
    }

    async fn establish(&self, identity: Identity) -> AuthOutcome {
        if self.is_authenticated() {
            self.logout().await;
        }
        if let Err(e) = self
            .credentials
            .save(&StoredCredentials::from(&identity))
            .await
        {
            warn!(error = %e, "Failed to persist credentials");
        }
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        if self.autostart_channel {
            self.channel.start(identity.clone()).await;
        }
        AuthOutcome::Success(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuth, FakeTransport, MemoryCredentials, fast_policy, identity, user};
    use parley_types::channel::ConnectionState;
    use std::time::Duration;

    struct Harness {
        auth: FakeAuth,
        store: MemoryCredentials,
        transport: FakeTransport,
        gate: IdentityGate<FakeAuth, MemoryCredentials, FakeTransport>,
    }

    fn harness() -> Harness {
        let auth = FakeAuth::default().with_account(user(7), "hunter2");
        let store = MemoryCredentials::default();
        let transport = FakeTransport::default();
        let channel = Arc::new(ChannelManager::new(transport.clone(), fast_policy()));
        let gate = IdentityGate::new(auth.clone(), store.clone(), channel);
        Harness {
            auth,
            store,
            transport,
            gate,
        }
    }

    async fn wait_connected(gate: &IdentityGate<FakeAuth, MemoryCredentials, FakeTransport>) {
        let mut state = gate.channel().state();
        tokio::time::timeout(Duration::from_secs(2), state.wait_for(|s| s.is_connected()))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn sign_in_success_sets_identity_and_connects() {
        let h = harness();
        let outcome = h
            .gate
            .sign_in(&Credentials::new("user7@example.com", "hunter2"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(h.gate.current().map(|i| i.user_id()), Some(7));
        assert_eq!(h.store.stored().map(|s| s.user.id), Some(7));
        wait_connected(&h.gate).await;
        assert_eq!(h.transport.connects(), 1);
    }

    #[tokio::test]
    async fn sign_in_failure_leaves_identity_unset() {
        let h = harness();
        let outcome = h.gate.sign_in(&Credentials::new("user7", "wrong")).await;

        match outcome {
            AuthOutcome::Failure { message } => assert!(!message.is_empty()),
            AuthOutcome::Success(_) => panic!("expected failure"),
        }
        assert!(h.gate.current().is_none());
        assert!(h.store.stored().is_none());
        assert_eq!(h.transport.connects(), 0);
    }

    #[tokio::test]
    async fn empty_fields_fail_without_backend_call() {
        let h = harness();
        let outcome = h.gate.sign_in(&Credentials::new("", "")).await;
        assert!(!outcome.is_success());

        let outcome = h
            .gate
            .sign_up(&Registration::new("luna", "no-at-sign", "pw"))
            .await;
        assert!(!outcome.is_success());
        assert_eq!(h.auth.calls(), 0);
    }

    #[tokio::test]
    async fn network_failure_message_is_displayable() {
        let h = harness();
        h.auth.set_outage(true);
        let outcome = h.gate.sign_in(&Credentials::new("user7", "hunter2")).await;
        match outcome {
            AuthOutcome::Failure { message } => assert_eq!(message, "Service Unavailable"),
            AuthOutcome::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn sign_up_establishes_identity() {
        let h = harness();
        let outcome = h
            .gate
            .sign_up(&Registration::new("luna", "luna@example.com", "moon"))
            .await;
        assert!(outcome.is_success());
        assert!(h.gate.is_authenticated());

        let again = h
            .gate
            .sign_up(&Registration::new("luna2", "luna@example.com", "moon"))
            .await;
        assert!(!again.is_success());
    }

    #[tokio::test]
    async fn restore_session_validates_stored_token() {
        let store = MemoryCredentials::default();
        store.preload(&identity(7));
        let channel = Arc::new(ChannelManager::new(FakeTransport::default(), fast_policy()));
        let gate = IdentityGate::new(
            FakeAuth::default().with_account(user(7), "hunter2"),
            store.clone(),
            channel,
        )
        .with_channel_autostart(false);

        let restored = gate.restore_session().await;
        assert_eq!(restored.map(|i| i.user_id()), Some(7));
        assert!(gate.is_authenticated());
        assert!(!gate.channel().is_started());
    }

    #[tokio::test]
    async fn restore_with_revoked_token_clears_storage() {
        let h = harness();
        h.store.preload(&identity(7));
        h.auth.revoke("token-7");

        assert!(h.gate.restore_session().await.is_none());
        assert!(h.store.stored().is_none());
        assert!(!h.gate.is_authenticated());
    }

    #[tokio::test]
    async fn restore_during_outage_keeps_token() {
        let h = harness();
        h.store.preload(&identity(7));
        h.auth.set_outage(true);

        assert!(h.gate.restore_session().await.is_none());
        assert!(h.store.stored().is_some());
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let h = harness();
        h.gate
            .sign_in(&Credentials::new("user7", "hunter2"))
            .await;
        wait_connected(&h.gate).await;

        h.gate.logout().await;
        assert!(h.gate.current().is_none());
        assert!(h.store.stored().is_none());
        assert_eq!(h.gate.channel().current_state(), ConnectionState::Disconnected);
        assert!(matches!(h.gate.require(), Err(ChatError::Auth(_))));

        // A second logout is harmless.
        h.gate.logout().await;
    }

    #[tokio::test]
    async fn signing_in_again_replaces_identity() {
        let h = harness();
        h.gate.sign_in(&Credentials::new("user7", "hunter2")).await;
        let outcome = h
            .gate
            .sign_up(&Registration::new("nova", "nova@example.com", "pw"))
            .await;

        let new_id = outcome.identity().map(|i| i.user_id());
        assert!(new_id.is_some());
        assert_eq!(h.gate.current().map(|i| i.user_id()), new_id);
        assert_eq!(h.store.stored().map(|s| s.user.id), new_id);
    }
}
