//! Real-time channel frames and connection state.
//!
//! Frames are JSON objects of the form `{"event": "<name>", "data": <payload>}`,
//! which the transport carries as Socket.IO events (`42["<name>", <payload>]`).
//! Client events announce room interest and carry outgoing messages; server
//! events push received messages and delivery acknowledgments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

use crate::chat::{DeliveryStatus, Message, MessageOrigin};

/// Lifecycle of the single live connection held for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Payload of a `sendMessage` client event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub content: String,
    pub chat_session_id: u64,
    pub user_id: u64,
    pub client_id: Uuid,
}

/// Client-to-server frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinSession(u64),
    LeaveSession(u64),
    SendMessage(OutgoingMessage),
}

/// A message pushed by the server.
///
/// Accepts both `content` and the CMS field casing `Content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub id: u64,
    #[serde(alias = "Content")]
    pub content: String,
    #[serde(default = "Utc::now", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub chat_session_id: Option<u64>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
}

impl IncomingMessage {
    /// Convert to a confirmed display message, tagging origin from the sender.
    pub fn into_message(self, local_user_id: u64) -> Message {
        Message {
            id: Some(self.id),
            client_id: self.client_id,
            session_id: self.chat_session_id,
            sender_id: self.user_id,
            content: self.content,
            created_at: self.created_at,
            origin: MessageOrigin::from_sender(self.user_id, local_user_id),
            status: DeliveryStatus::Confirmed,
        }
    }
}

/// Server acknowledgment that a client-sent message was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAck {
    pub client_id: Uuid,
    pub id: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Server-to-client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage(IncomingMessage),
    MessageAck(MessageAck),
}
