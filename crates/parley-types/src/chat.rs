//! Chat session and message types for Parley.
//!
//! A `ChatSession` is a named conversation container owned by a user; a
//! `Message` is a single utterance within it. Messages carry an explicit
//! origin tag and a delivery status so optimistic local echoes can be
//! reconciled against the server-confirmed copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// A named conversation container owned by a user.
///
/// `document_id` is only present on CMS versions that expose document ids;
/// when set it is the key used for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: u64,
    pub document_id: Option<String>,
    pub title: String,
    pub owner_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Path segment used to address this session for deletion.
    pub fn delete_key(&self) -> String {
        self.document_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Whether `key` names this session, by numeric id or document id.
    pub fn matches_key(&self, key: &str) -> bool {
        self.id.to_string() == key || self.document_id.as_deref() == Some(key)
    }
}

/// Who authored a message, relative to the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    Local,
    Remote,
}

impl MessageOrigin {
    /// Derive the origin from the message's sender compared with the local user.
    ///
    /// Messages without a sender id are treated as remote.
    pub fn from_sender(sender_id: Option<u64>, local_user_id: u64) -> Self {
        match sender_id {
            Some(id) if id == local_user_id => MessageOrigin::Local,
            _ => MessageOrigin::Remote,
        }
    }
}

impl fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOrigin::Local => write!(f, "local"),
            MessageOrigin::Remote => write!(f, "remote"),
        }
    }
}

/// Delivery state of a message in the displayed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Inserted optimistically, no server confirmation yet.
    Pending,
    /// Known to the server (fetched, received, echoed, or acknowledged).
    Confirmed,
    /// Transmission failed or no confirmation arrived in time.
    Failed,
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Confirmed
    }
}

/// A single chat utterance within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server id; `None` until the server confirms an optimistic message.
    pub id: Option<u64>,
    /// Client correlation id for messages sent from this client.
    pub client_id: Option<Uuid>,
    pub session_id: Option<u64>,
    pub sender_id: Option<u64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub origin: MessageOrigin,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Message {
    /// Build the optimistic local copy of an outgoing message.
    pub fn optimistic(session_id: u64, sender_id: u64, client_id: Uuid, content: String) -> Self {
        Self {
            id: None,
            client_id: Some(client_id),
            session_id: Some(session_id),
            sender_id: Some(sender_id),
            content,
            created_at: Utc::now(),
            origin: MessageOrigin::Local,
            status: DeliveryStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }
}
