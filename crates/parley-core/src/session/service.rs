//! Session service wrapping a `SessionStore` with validation and logging.
//!
//! Holds no cache: every call goes to the store, so a session created here
//! is visible in the very next listing.

use parley_types::chat::{ChatSession, Message};
use parley_types::error::ChatError;
use parley_types::identity::Identity;
use tracing::{debug, info, warn};

use crate::session::store::{SessionStore, validate_title};

/// Orchestrates session CRUD on behalf of the signed-in identity.
///
/// Generic over `SessionStore` to keep parley-core free of HTTP crates.
pub struct SessionService<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> SessionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// List the identity's sessions, newest last as returned by the server.
    pub async fn list_sessions(&self, identity: &Identity) -> Result<Vec<ChatSession>, ChatError> {
        let sessions = self.store.list_sessions(identity).await?;
        debug!(count = sessions.len(), user_id = identity.user_id(), "Listed chat sessions");
        Ok(sessions)
    }

    /// Create a session owned by the identity.
    ///
    /// An empty title is rejected before any request is made.
    pub async fn create_session(
        &self,
        title: &str,
        identity: &Identity,
    ) -> Result<ChatSession, ChatError> {
        let title = validate_title(title)?;
        let session = self
            .store
            .create_session(&title, identity.user_id(), identity)
            .await?;
        info!(session_id = session.id, title = %session.title, "Chat session created");
        Ok(session)
    }

    /// Look a session up by numeric id among the identity's sessions.
    pub async fn find_session(
        &self,
        session_id: u64,
        identity: &Identity,
    ) -> Result<Option<ChatSession>, ChatError> {
        let sessions = self.store.list_sessions(identity).await?;
        Ok(sessions.into_iter().find(|s| s.id == session_id))
    }

    /// Delete a session by key, without listing first.
    pub async fn delete_session(&self, session_key: &str, identity: &Identity) -> Result<(), ChatError> {
        match self.store.delete_session(session_key, identity).await {
            Ok(()) => {
                info!(session_key, "Chat session deleted");
                Ok(())
            }
            Err(e) => {
                warn!(session_key, error = %e, "Failed to delete chat session");
                Err(e)
            }
        }
    }

    /// Fetch message history for a session.
    pub async fn history(
        &self,
        session_id: u64,
        identity: &Identity,
    ) -> Result<Vec<Message>, ChatError> {
        self.store.fetch_history(session_id, identity).await
    }
}
