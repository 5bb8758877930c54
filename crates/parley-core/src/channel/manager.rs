//! Channel manager: owns the single live connection for the active identity.
//!
//! A supervisor task holds the connection and runs the read/write pump.
//! Callers interact through the manager: room membership is tracked locally
//! and replayed after every reconnect, outgoing frames go through a bounded
//! queue, and inbound events are fanned out to per-subscriber mailboxes in
//! the same shape as the agent message bus (bounded `mpsc`, `try_send`,
//! closed mailboxes pruned on delivery).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use dashmap::DashMap;
use parley_types::channel::{
    ClientEvent, ConnectionState, IncomingMessage, MessageAck, OutgoingMessage, ServerEvent,
};
use parley_types::config::ReconnectPolicy;
use parley_types::error::ChatError;
use parley_types::identity::Identity;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backoff::backoff_delay;
use super::transport::{Connection, Transport};

/// Buffer size for per-subscriber event mailboxes.
const SUBSCRIBER_BUFFER: usize = 256;

/// Buffer size for frames waiting to be written to the connection.
const OUTGOING_BUFFER: usize = 256;

/// Buffer size for the connection notice broadcast.
const NOTICE_BUFFER: usize = 64;

/// Event delivered to message subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A `receiveMessage` push, in arrival order.
    Message(IncomingMessage),
    /// The server persisted a message this client sent.
    Ack(MessageAck),
    /// The connection was re-established after a drop; events may have been missed.
    Reconnected,
}

/// Connection lifecycle notices for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelNotice {
    Connected,
    Reconnected,
    Disconnected,
    /// Reconnect budget exhausted or credentials rejected; the manager stopped.
    GaveUp,
}

/// A registered message handler's mailbox.
///
/// Dropping the subscription deregisters it.
pub struct MessageSubscription {
    id: u64,
    rx: mpsc::Receiver<ChannelEvent>,
    shared: Weak<Shared>,
}

impl MessageSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` once the manager is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for MessageSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSubscription")
            .field("id", &self.id)
            .finish()
    }
}

/// State shared between the manager handle and its supervisor task.
struct Shared {
    state: watch::Sender<ConnectionState>,
    notices: broadcast::Sender<ChannelNotice>,
    subscribers: DashMap<u64, mpsc::Sender<ChannelEvent>>,
    rooms: Mutex<BTreeSet<u64>>,
}

impl Shared {
    fn rooms(&self) -> MutexGuard<'_, BTreeSet<u64>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Channel state changed");
        }
    }

    fn notify(&self, notice: ChannelNotice) {
        let _ = self.notices.send(notice);
    }

    /// Deliver an event to every subscriber mailbox.
    fn publish(&self, event: ChannelEvent) {
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = *entry.key(), "Subscriber mailbox full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }

    /// Decode one inbound frame and fan it out.
    fn dispatch(&self, frame: &str) {
        match serde_json::from_str::<ServerEvent>(frame) {
            Ok(ServerEvent::ReceiveMessage(message)) => {
                debug!(message_id = message.id, session_id = ?message.chat_session_id, "Received message");
                self.publish(ChannelEvent::Message(message));
            }
            Ok(ServerEvent::MessageAck(ack)) => {
                debug!(message_id = ack.id, client_id = %ack.client_id, "Message acknowledged");
                self.publish(ChannelEvent::Ack(ack));
            }
            Err(e) => debug!(error = %e, "Ignoring unrecognized channel frame"),
        }
    }
}

/// Handle to the running supervisor task.
struct Link {
    outgoing: mpsc::Sender<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Maintains one real-time connection per identity.
///
/// Generic over `Transport` so parley-core never touches socket crates.
pub struct ChannelManager<T: Transport> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    link: Mutex<Option<Link>>,
    next_subscriber: AtomicU64,
}

impl<T: Transport> ChannelManager<T> {
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        Self {
            transport: Arc::new(transport),
            policy,
            shared: Arc::new(Shared {
                state,
                notices,
                subscribers: DashMap::new(),
                rooms: Mutex::new(BTreeSet::new()),
            }),
            link: Mutex::new(None),
            next_subscriber: AtomicU64::new(1),
        }
    }

    fn link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin connecting as `identity`.
    ///
    /// Any previous connection is torn down first. Returns immediately; use
    /// [`state`](Self::state) to observe progress.
    pub async fn start(&self, identity: Identity) {
        self.stop_link().await;

        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);
        let cancel = CancellationToken::new();
        info!(user_id = identity.user_id(), "Starting real-time channel");

        let task = tokio::spawn(supervise(
            Arc::clone(&self.transport),
            identity,
            self.policy.clone(),
            Arc::clone(&self.shared),
            outgoing_rx,
            cancel.clone(),
        ));

        *self.link() = Some(Link {
            outgoing: outgoing_tx,
            cancel,
            task,
        });
    }

    /// Close the connection and forget all room memberships.
    ///
    /// Subscribers stay registered; they simply stop receiving events.
    pub async fn shutdown(&self) {
        self.stop_link().await;
        self.shared.rooms().clear();
        self.shared.set_state(ConnectionState::Disconnected);
    }

    async fn stop_link(&self) {
        let link = self.link().take();
        if let Some(link) = link {
            link.cancel.cancel();
            if let Err(e) = link.task.await {
                warn!(error = %e, "Channel supervisor ended abnormally");
            }
            info!("Real-time channel stopped");
        }
    }

    /// Whether a supervisor task is running (connected or retrying).
    pub fn is_started(&self) -> bool {
        self.link().is_some()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected()
    }

    /// Watch connection state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Receive connection lifecycle notices.
    pub fn notices(&self) -> broadcast::Receiver<ChannelNotice> {
        self.shared.notices.subscribe()
    }

    /// Rooms currently joined, in ascending id order.
    pub fn joined_rooms(&self) -> Vec<u64> {
        self.shared.rooms().iter().copied().collect()
    }

    /// Announce interest in a session's room.
    ///
    /// Membership is recorded even while disconnected and is announced once
    /// the connection is up. Joining a room twice sends nothing the second time.
    pub async fn join_room(&self, session_id: u64) {
        let added = self.shared.rooms().insert(session_id);
        if !added {
            return;
        }
        debug!(session_id, "Joining room");
        if self.is_connected() {
            self.enqueue(&ClientEvent::JoinSession(session_id)).await;
        }
    }

    /// Withdraw interest in a session's room. Leaving a room that was never
    /// joined is a no-op.
    pub async fn leave_room(&self, session_id: u64) {
        let removed = self.shared.rooms().remove(&session_id);
        if !removed {
            return;
        }
        debug!(session_id, "Leaving room");
        if self.is_connected() {
            self.enqueue(&ClientEvent::LeaveSession(session_id)).await;
        }
    }

    /// Transmit a chat message into a session's room.
    ///
    /// Fails with `NotConnected` when there is no live connection; nothing
    /// is queued for later delivery.
    pub async fn send(
        &self,
        session_id: u64,
        content: &str,
        sender_id: u64,
        client_id: Uuid,
    ) -> Result<(), ChatError> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        let frame = encode(&ClientEvent::SendMessage(OutgoingMessage {
            content: content.to_string(),
            chat_session_id: session_id,
            user_id: sender_id,
            client_id,
        }))?;
        let outgoing = self.outgoing().ok_or(ChatError::NotConnected)?;
        outgoing
            .send(frame)
            .await
            .map_err(|_| ChatError::NotConnected)?;
        debug!(session_id, %client_id, "Message queued for transmission");
        Ok(())
    }

    /// Register a message handler. Events are delivered in arrival order.
    pub fn on_message(&self) -> MessageSubscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.shared.subscribers.insert(id, tx);
        debug!(subscriber = id, "Registered message handler");
        MessageSubscription {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Deregister a message handler. Returns `true` if it was registered.
    pub fn off(&self, subscription_id: u64) -> bool {
        let removed = self.shared.subscribers.remove(&subscription_id).is_some();
        if removed {
            debug!(subscriber = subscription_id, "Deregistered message handler");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    fn outgoing(&self) -> Option<mpsc::Sender<String>> {
        self.link().as_ref().map(|link| link.outgoing.clone())
    }

    async fn enqueue(&self, event: &ClientEvent) {
        let frame = match encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode channel frame");
                return;
            }
        };
        if let Some(outgoing) = self.outgoing() {
            if outgoing.send(frame).await.is_err() {
                debug!("Channel closed before frame could be queued");
            }
        }
    }
}

impl<T: Transport> Drop for ChannelManager<T> {
    fn drop(&mut self) {
        if let Some(link) = self.link().take() {
            link.cancel.cancel();
        }
    }
}

fn encode(event: &ClientEvent) -> Result<String, ChatError> {
    serde_json::to_string(event).map_err(|e| ChatError::Decode(e.to_string()))
}

enum PumpExit {
    Cancelled,
    Dropped,
}

/// Connect, pump, and reconnect until cancelled or the retry budget runs out.
async fn supervise<T: Transport>(
    transport: Arc<T>,
    identity: Identity,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    mut outgoing: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    let mut failures: u32 = 0;
    let mut connected_before = false;

    loop {
        shared.set_state(ConnectionState::Connecting);
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = transport.connect(&identity) => result,
        };

        match attempt {
            Ok(mut connection) => {
                failures = 0;
                // Frames queued for a previous connection are stale; rooms are
                // replayed from the membership set instead.
                while outgoing.try_recv().is_ok() {}
                shared.set_state(ConnectionState::Connected);

                let rooms: Vec<u64> = shared.rooms().iter().copied().collect();
                let mut rejoined = true;
                for session_id in rooms {
                    let frame = match encode(&ClientEvent::JoinSession(session_id)) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };
                    if let Err(e) = connection.send_text(frame).await {
                        warn!(session_id, error = %e, "Failed to rejoin room");
                        rejoined = false;
                        break;
                    }
                }

                let exit = if rejoined {
                    if connected_before {
                        info!(user_id = identity.user_id(), "Real-time channel reconnected");
                        shared.notify(ChannelNotice::Reconnected);
                        shared.publish(ChannelEvent::Reconnected);
                    } else {
                        info!(user_id = identity.user_id(), "Real-time channel connected");
                        shared.notify(ChannelNotice::Connected);
                    }
                    connected_before = true;
                    pump(&mut connection, &shared, &mut outgoing, &cancel).await
                } else {
                    PumpExit::Dropped
                };

                shared.set_state(ConnectionState::Disconnected);
                shared.notify(ChannelNotice::Disconnected);
                connection.close().await;
                if matches!(exit, PumpExit::Cancelled) {
                    break;
                }
                warn!("Real-time channel dropped");
            }
            Err(e) if e.is_auth() => {
                warn!(error = %e, "Real-time channel rejected credentials");
                shared.set_state(ConnectionState::Disconnected);
                shared.notify(ChannelNotice::GaveUp);
                break;
            }
            Err(e) => {
                warn!(error = %e, attempt = failures + 1, "Real-time channel connection failed");
                shared.set_state(ConnectionState::Disconnected);
            }
        }

        failures += 1;
        let Some(delay) = backoff_delay(&policy, failures) else {
            warn!(attempts = failures, "Giving up on real-time channel");
            shared.notify(ChannelNotice::GaveUp);
            break;
        };
        debug!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

/// Move frames until the connection drops or the manager cancels.
async fn pump<C: Connection>(
    connection: &mut C,
    shared: &Shared,
    outgoing: &mut mpsc::Receiver<String>,
    cancel: &CancellationToken,
) -> PumpExit {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = connection.send_text(frame).await {
                        warn!(error = %e, "Failed to write channel frame");
                        return PumpExit::Dropped;
                    }
                }
                None => return PumpExit::Cancelled,
            },
            incoming = connection.next_text() => match incoming {
                Some(Ok(frame)) => shared.dispatch(&frame),
                Some(Err(e)) => {
                    warn!(error = %e, "Channel read failed");
                    return PumpExit::Dropped;
                }
                None => return PumpExit::Dropped,
            },
        }
    }
}
