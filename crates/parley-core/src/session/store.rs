//! SessionStore trait definition.
//!
//! Provides list/create/delete for chat sessions and history fetch for
//! messages. No retries are performed; callers re-invoke on failure.

use parley_types::chat::{ChatSession, Message};
use parley_types::error::ChatError;
use parley_types::identity::Identity;

/// Port for chat session and message history access.
///
/// Implementations live in parley-infra (e.g., `CmsClient`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait SessionStore: Send + Sync {
    /// List the sessions owned by the identity.
    fn list_sessions(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, ChatError>> + Send;

    /// Create a session with the given title for `owner_id`.
    ///
    /// The title must already have passed [`validate_title`].
    fn create_session(
        &self,
        title: &str,
        owner_id: u64,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<ChatSession, ChatError>> + Send;

    /// Delete the session addressed by `session_key`: its document id when
    /// the CMS issues one, otherwise its numeric id (see
    /// [`ChatSession::delete_key`]). Not idempotent: deleting twice yields a
    /// network error.
    fn delete_session(
        &self,
        session_key: &str,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;

    /// Fetch a session's messages in server order (oldest first).
    ///
    /// Origin is tagged relative to `identity`.
    fn fetch_history(
        &self,
        session_id: u64,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, ChatError>> + Send;
}

/// Check a session title before submission. Returns the trimmed title.
pub fn validate_title(title: &str) -> Result<String, ChatError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation(
            "session title must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
