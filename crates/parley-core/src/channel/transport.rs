//! Transport port for the real-time channel.
//!
//! A `Transport` opens a `Connection` for an identity; a connection moves
//! opaque text frames in both directions. Framing (JSON events) is handled
//! by the channel manager, so implementations only deal with bytes on the
//! wire. The WebSocket implementation lives in parley-infra.

use parley_types::error::ChatError;
use parley_types::identity::Identity;

/// Opens authenticated connections to the real-time endpoint.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Establish a connection authenticated as `identity`.
    ///
    /// A rejected token must surface as `ChatError::Auth` so the manager
    /// can stop retrying.
    fn connect(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<Self::Connection, ChatError>> + Send;
}

/// A live, bidirectional text-frame connection.
pub trait Connection: Send + 'static {
    /// Write one text frame.
    fn send_text(
        &mut self,
        frame: String,
    ) -> impl std::future::Future<Output = Result<(), ChatError>> + Send;

    /// Read the next text frame. `None` means the peer closed the connection.
    ///
    /// Must be cancel-safe: the manager races it against outgoing frames.
    fn next_text(
        &mut self,
    ) -> impl std::future::Future<Output = Option<Result<String, ChatError>>> + Send;

    /// Close the connection. Errors are swallowed.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
