//! Engine.IO v4 / Socket.IO v4 packet codec.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by its payload. Engine.IO `message` packets (`4`) carry a
//! Socket.IO packet, again led by a type digit, an optional `/namespace,`
//! and an optional ack id. Only the default namespace is used.
//!
//! The channel manager speaks `{"event": <name>, "data": <payload>}` frames;
//! `encode_event` and `Packet::Event` translate between those and
//! `42["<name>", <payload>]`.

use std::time::Duration;

use parley_types::error::ChatError;
use serde::Deserialize;
use serde_json::{Value, json};

/// Engine.IO handshake data from the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Longest silence tolerated before the connection counts as dead.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    /// Engine.IO close.
    Close,
    /// Heartbeat probe; the payload must be echoed in the pong.
    Ping(String),
    Pong,
    Noop,
    /// Socket.IO namespace connect accepted.
    Connected,
    /// Socket.IO namespace connect refused (usually by auth middleware).
    ConnectError(String),
    /// Socket.IO namespace disconnect.
    Disconnect,
    Event { name: String, data: Value },
    /// Anything this client does not act on (acks, binary, upgrades).
    Other,
}

/// Engine.IO pong answering a ping with `payload`.
pub fn pong(payload: &str) -> String {
    format!("3{payload}")
}

/// Socket.IO connect for the default namespace, with an auth payload.
pub fn connect(token: &str) -> String {
    format!("40{}", json!({ "token": token }))
}

/// Socket.IO disconnect for the default namespace.
pub fn disconnect() -> String {
    "41".to_string()
}

/// Translate a `{"event", "data"}` frame into a Socket.IO event packet.
pub fn encode_event(frame: &str) -> Result<String, ChatError> {
    let mut value: Value = serde_json::from_str(frame)
        .map_err(|e| ChatError::Decode(format!("outgoing frame is not JSON: {e}")))?;
    let Some(name) = value.get("event").and_then(Value::as_str).map(str::to_owned) else {
        return Err(ChatError::Decode("outgoing frame has no event name".to_string()));
    };
    let args = match value.get_mut("data").map(Value::take) {
        None | Some(Value::Null) => json!([name]),
        Some(data) => json!([name, data]),
    };
    Ok(format!("42{args}"))
}

/// Decode one inbound WebSocket text frame.
pub fn decode(text: &str) -> Result<Packet, ChatError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChatError::Decode("empty engine.io packet".to_string()))?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(Packet::Open)
            .map_err(|e| ChatError::Decode(format!("bad engine.io open packet: {e}"))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(body.to_string())),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(body),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(ChatError::Decode(format!("unknown engine.io packet type '{other}'"))),
    }
}

fn decode_socket(text: &str) -> Result<Packet, ChatError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ChatError::Decode("empty socket.io packet".to_string()))?;
    let rest = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' => Ok(Packet::Connected),
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(rest),
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| "connection refused".to_string());
            Ok(Packet::ConnectError(message))
        }
        _ => Ok(Packet::Other),
    }
}

fn decode_event(args: &str) -> Result<Packet, ChatError> {
    let args: Vec<Value> = serde_json::from_str(args)
        .map_err(|e| ChatError::Decode(format!("bad socket.io event: {e}")))?;
    let mut args = args.into_iter();
    let Some(Value::String(name)) = args.next() else {
        return Err(ChatError::Decode("socket.io event without a name".to_string()));
    };
    Ok(Packet::Event {
        name,
        data: args.next().unwrap_or(Value::Null),
    })
}

/// `/chat,["x"]` -> `["x"]`; payloads without a namespace are unchanged.
fn strip_namespace(text: &str) -> &str {
    if !text.starts_with('/') {
        return text;
    }
    match text.find(',') {
        Some(index) => &text[index + 1..],
        None => "",
    }
}

fn strip_ack_id(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
}

impl Packet {
    /// The `{"event", "data"}` frame the channel manager understands.
    pub fn into_frame(self) -> Option<String> {
        match self {
            Packet::Event { name, data } => Some(json!({ "event": name, "data": data }).to_string()),
            _ => None,
        }
    }
}
