//! Wire types for the CMS REST API.
//!
//! Entries are accepted in both the flat shape (`{id, documentId, Title}`)
//! and the nested shape (`{id, attributes: {Title}}`). Relations may arrive
//! as a bare id, an object with `id`, or a `{data: ...}` wrapper.

use chrono::{DateTime, Utc};
use parley_types::chat::{ChatSession, DeliveryStatus, Message, MessageOrigin};
use parley_types::error::ChatError;
use parley_types::identity::User;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/auth/local`.
#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/auth/local/register`.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of both auth endpoints.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub jwt: String,
    pub user: User,
}

/// Body of `POST /api/chat-sessions`.
#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub data: CreateSessionData<'a>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionData<'a> {
    #[serde(rename = "Title")]
    pub title: &'a str,
    pub user: u64,
}

/// `{data, meta}` envelope around every content response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_count: u32,
}

impl<T> Envelope<T> {
    /// Whether more pages follow the one in this envelope.
    pub fn has_more_pages(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .is_some_and(|p| p.page < p.page_count)
    }
}

#[derive(Debug, Deserialize)]
struct SessionRecord {
    id: u64,
    #[serde(rename = "documentId", default)]
    document_id: Option<String>,
    #[serde(rename = "Title", alias = "title", default)]
    title: String,
    #[serde(rename = "createdAt", alias = "created_at", default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    user: Value,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    id: u64,
    #[serde(rename = "Content", alias = "content", default)]
    content: String,
    #[serde(rename = "createdAt", alias = "created_at", default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    user: Value,
    #[serde(default)]
    chat_session: Value,
}

/// Merge a nested `attributes` object into the top level of an entry.
fn flatten_entry(entry: Value) -> Result<Value, ChatError> {
    let Value::Object(mut map) = entry else {
        return Err(ChatError::Decode("expected an object entry".to_string()));
    };
    if let Some(Value::Object(attributes)) = map.remove("attributes") {
        for (key, value) in attributes {
            map.entry(key).or_insert(value);
        }
    }
    Ok(Value::Object(map))
}

/// Extract the id from a relation value in any of its shapes.
pub fn relation_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => match map.get("id") {
            Some(id) => relation_id(id),
            None => map.get("data").and_then(relation_id),
        },
        _ => None,
    }
}

/// Decode one chat session entry. `default_owner` fills in the owner when
/// the relation was not populated.
pub fn decode_session(entry: Value, default_owner: Option<u64>) -> Result<ChatSession, ChatError> {
    let record: SessionRecord = serde_json::from_value(flatten_entry(entry)?)
        .map_err(|e| ChatError::Decode(format!("chat session: {e}")))?;
    Ok(ChatSession {
        id: record.id,
        document_id: record.document_id,
        title: record.title,
        owner_id: relation_id(&record.user).or(default_owner),
        created_at: record.created_at,
    })
}

/// Decode one message entry, tagging origin relative to `local_user_id`.
pub fn decode_message(
    entry: Value,
    session_id: u64,
    local_user_id: u64,
) -> Result<Message, ChatError> {
    let record: MessageRecord = serde_json::from_value(flatten_entry(entry)?)
        .map_err(|e| ChatError::Decode(format!("message: {e}")))?;
    let sender_id = relation_id(&record.user);
    Ok(Message {
        id: Some(record.id),
        client_id: None,
        session_id: relation_id(&record.chat_session).or(Some(session_id)),
        sender_id,
        content: record.content,
        created_at: record.created_at,
        origin: MessageOrigin::from_sender(sender_id, local_user_id),
        status: DeliveryStatus::Confirmed,
    })
}

/// Pull `error.message` out of a CMS error body, if present and non-empty.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let message = match value.get("error") {
        Some(Value::Object(error)) => error.get("message")?.as_str()?,
        Some(Value::String(message)) => message.as_str(),
        _ => value.get("message")?.as_str()?,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_flat_session() {
        let entry = json!({
            "id": 4,
            "documentId": "abc123",
            "Title": "Standup",
            "createdAt": "2025-03-01T10:00:00.000Z",
            "user": {"id": 7, "username": "luna"}
        });
        let session = decode_session(entry, None).unwrap();
        assert_eq!(session.id, 4);
        assert_eq!(session.document_id.as_deref(), Some("abc123"));
        assert_eq!(session.title, "Standup");
        assert_eq!(session.owner_id, Some(7));
    }

    #[test]
    fn test_decode_nested_session_uses_default_owner() {
        let entry = json!({
            "id": 5,
            "attributes": {"Title": "Retro", "createdAt": "2025-03-01T10:00:00Z"}
        });
        let session = decode_session(entry, Some(9)).unwrap();
        assert_eq!(session.title, "Retro");
        assert!(session.document_id.is_none());
        assert_eq!(session.owner_id, Some(9));
    }

    #[test]
    fn test_decode_message_with_wrapped_relation() {
        let entry = json!({
            "id": 11,
            "attributes": {
                "Content": "hi there",
                "createdAt": "2025-03-01T10:00:05Z",
                "user": {"data": {"id": 7, "attributes": {"username": "luna"}}}
            }
        });
        let message = decode_message(entry, 4, 7).unwrap();
        assert_eq!(message.content, "hi there");
        assert_eq!(message.sender_id, Some(7));
        assert_eq!(message.session_id, Some(4));
        assert_eq!(message.origin, MessageOrigin::Local);
    }

    #[test]
    fn test_message_without_sender_is_remote() {
        let entry = json!({"id": 12, "Content": "anon", "createdAt": "2025-03-01T10:00:05Z"});
        let message = decode_message(entry, 4, 7).unwrap();
        assert_eq!(message.origin, MessageOrigin::Remote);
    }

    #[test]
    fn test_relation_id_shapes() {
        assert_eq!(relation_id(&json!(3)), Some(3));
        assert_eq!(relation_id(&json!("3")), Some(3));
        assert_eq!(relation_id(&json!({"id": 3})), Some(3));
        assert_eq!(relation_id(&json!({"data": {"id": 3}})), Some(3));
        assert_eq!(relation_id(&json!({"data": null})), None);
        assert_eq!(relation_id(&Value::Null), None);
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"data":null,"error":{"status":400,"name":"ValidationError","message":"Invalid identifier or password"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Invalid identifier or password")
        );
        assert_eq!(error_message(r#"{"error":{"message":"  "}}"#), None);
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_pagination_detection() {
        let envelope: Envelope<Vec<Value>> = serde_json::from_value(json!({
            "data": [],
            "meta": {"pagination": {"page": 1, "pageSize": 25, "pageCount": 2, "total": 30}}
        }))
        .unwrap();
        assert!(envelope.has_more_pages());

        let envelope: Envelope<Vec<Value>> = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(!envelope.has_more_pages());
    }
}
