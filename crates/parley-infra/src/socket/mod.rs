//! Socket.IO transport for the real-time channel.
//!
//! Opens one `tokio-tungstenite` connection per identity to the server's
//! Socket.IO endpoint (`/socket.io/?EIO=4&transport=websocket`), with the
//! identity's Bearer token on the upgrade request and in the namespace
//! connect packet. Frames handed to the channel manager are
//! `{"event", "data"}` JSON; the Engine.IO/Socket.IO framing, heartbeats
//! and handshake stay inside this module.

pub mod packet;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley_core::channel::{Connection, Transport};
use parley_types::error::ChatError;
use parley_types::identity::Identity;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use self::packet::Packet;

/// Upper bound for the Engine.IO open plus namespace connect exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a Socket.IO server over `ws://` or `wss://`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: Url,
}

impl WebSocketTransport {
    /// `socket_url` is the server origin (`ws://localhost:1337`) or a full
    /// endpoint URL when the server mounts Socket.IO on a custom path.
    pub fn new(socket_url: &str) -> Result<Self, ChatError> {
        let url = Url::parse(socket_url).map_err(|e| {
            ChatError::Validation(format!("invalid socket url '{socket_url}': {e}"))
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url: endpoint(url),
            }),
            other => Err(ChatError::Validation(format!(
                "socket url must use ws:// or wss://, got '{other}://'"
            ))),
        }
    }
}

/// Fill in the default Socket.IO path and the Engine.IO query.
fn endpoint(mut url: Url) -> Url {
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    if !url.query_pairs().any(|(key, _)| key == "EIO") {
        url.query_pairs_mut()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
    }
    url
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn connect(&self, identity: &Identity) -> Result<WebSocketConnection, ChatError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ChatError::network(None, e.to_string()))?;
        let bearer = HeaderValue::from_str(&identity.bearer())
            .map_err(|_| ChatError::Auth("token contains invalid characters".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let mut stream = match connect_async(request).await {
            Ok((stream, response)) => {
                debug!(url = %self.url, status = response.status().as_u16(), "WebSocket upgraded");
                stream
            }
            Err(tungstenite::Error::Http(response))
                if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
            {
                return Err(ChatError::Auth("real-time channel rejected the token".to_string()));
            }
            Err(e) => {
                return Err(ChatError::network(None, format!("websocket connect failed: {e}")));
            }
        };

        let token = identity.token().expose_secret().to_string();
        let heartbeat = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut stream, &token))
            .await
            .map_err(|_| ChatError::network(None, "socket.io handshake timed out"))??;
        debug!(url = %self.url, ?heartbeat, "Socket.IO namespace connected");
        Ok(WebSocketConnection { stream, heartbeat })
    }
}

/// Wait for the Engine.IO open, join the default namespace and wait for
/// the server to accept. Returns the heartbeat window.
async fn handshake(stream: &mut WsStream, token: &str) -> Result<Duration, ChatError> {
    let mut heartbeat = None;
    loop {
        let text = match stream.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                return Err(ChatError::network(None, "socket.io server closed during handshake"));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(ChatError::network(None, format!("socket.io handshake failed: {e}")));
            }
        };
        match packet::decode(&text)? {
            Packet::Open(info) => {
                heartbeat = Some(info.heartbeat());
                send_raw(stream, packet::connect(token)).await?;
            }
            Packet::Ping(payload) => send_raw(stream, packet::pong(&payload)).await?,
            Packet::Connected => {
                return heartbeat.ok_or_else(|| {
                    ChatError::Decode("socket.io connect before engine.io open".to_string())
                });
            }
            Packet::ConnectError(message) => return Err(ChatError::Auth(message)),
            Packet::Close | Packet::Disconnect => {
                return Err(ChatError::network(None, "socket.io server refused the connection"));
            }
            other => debug!(packet = ?other, "Ignoring packet during handshake"),
        }
    }
}

async fn send_raw(stream: &mut WsStream, text: String) -> Result<(), ChatError> {
    stream
        .send(Message::Text(text))
        .await
        .map_err(|e| ChatError::network(None, format!("websocket send failed: {e}")))
}

pub struct WebSocketConnection {
    stream: WsStream,
    heartbeat: Duration,
}

impl Connection for WebSocketConnection {
    async fn send_text(&mut self, frame: String) -> Result<(), ChatError> {
        let packet = packet::encode_event(&frame)?;
        send_raw(&mut self.stream, packet).await
    }

    async fn next_text(&mut self) -> Option<Result<String, ChatError>> {
        loop {
            let next = match tokio::time::timeout(self.heartbeat, self.stream.next()).await {
                Ok(next) => next?,
                Err(_) => {
                    return Some(Err(ChatError::network(None, "socket.io heartbeat timed out")));
                }
            };
            let text = match next {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by peer");
                    return None;
                }
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(e) => {
                    return Some(Err(ChatError::network(
                        None,
                        format!("websocket read failed: {e}"),
                    )));
                }
            };
            match packet::decode(&text) {
                Ok(Packet::Ping(payload)) => {
                    if let Err(e) = send_raw(&mut self.stream, packet::pong(&payload)).await {
                        return Some(Err(e));
                    }
                }
                Ok(event @ Packet::Event { .. }) => return event.into_frame().map(Ok),
                Ok(Packet::Close | Packet::Disconnect) => {
                    debug!("Socket.IO server disconnected");
                    return None;
                }
                Ok(Packet::ConnectError(message)) => return Some(Err(ChatError::Auth(message))),
                Ok(_) => continue,
                Err(e) => debug!(error = %e, "Skipping undecodable socket.io frame"),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = send_raw(&mut self.stream, packet::disconnect()).await {
            debug!(error = %e, "Socket.IO disconnect was not sent");
        }
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close did not complete cleanly");
        }
    }
}
