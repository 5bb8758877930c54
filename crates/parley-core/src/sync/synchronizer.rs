//! Session synchronizer: one ordered, de-duplicated view of the active
//! session built from REST history and live channel events.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_types::chat::Message;
use parley_types::error::ChatError;
use parley_types::identity::Identity;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::timeline::{Applied, Timeline};
use crate::channel::{ChannelEvent, ChannelManager, MessageSubscription, Transport};
use crate::session::SessionStore;

/// Effect of one channel event on the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncUpdate {
    /// A new message was added to the sequence.
    Inserted,
    /// A pending local message was confirmed by its echo or an ack.
    Confirmed,
    /// The channel reconnected and history was merged; carries the number
    /// of messages that had been missed.
    Resynced(usize),
    /// Duplicate, foreign-session, or unmatched event.
    Ignored,
}

struct ActiveSession {
    session_id: u64,
    identity: Identity,
    subscription: MessageSubscription,
    timeline: Timeline,
}

pub struct SessionSynchronizer<S: SessionStore, T: Transport> {
    store: Arc<S>,
    channel: Arc<ChannelManager<T>>,
    active: Option<ActiveSession>,
}

impl<S: SessionStore, T: Transport> SessionSynchronizer<S, T> {
    pub fn new(store: Arc<S>, channel: Arc<ChannelManager<T>>) -> Self {
        Self {
            store,
            channel,
            active: None,
        }
    }

    pub fn active_session_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.session_id)
    }

    /// The displayed sequence. Empty when no session is active.
    pub fn messages(&self) -> &[Message] {
        self.active
            .as_ref()
            .map(|a| a.timeline.messages())
            .unwrap_or(&[])
    }

    pub fn pending_count(&self) -> usize {
        self.active
            .as_ref()
            .map(|a| a.timeline.pending_count())
            .unwrap_or(0)
    }

    /// Make `session_id` the active session.
    ///
    /// Live events are captured from before the room is joined, so messages
    /// arriving while history loads are applied after it. If the history
    /// fetch fails the room is left again and no session is active.
    pub async fn activate(&mut self, session_id: u64, identity: &Identity) -> Result<(), ChatError> {
        if self.active_session_id() == Some(session_id) {
            return Ok(());
        }
        self.deactivate().await;

        let subscription = self.channel.on_message();
        self.channel.join_room(session_id).await;

        let history = match self.store.fetch_history(session_id, identity).await {
            Ok(history) => history,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to load message history");
                self.channel.leave_room(session_id).await;
                self.channel.off(subscription.id());
                return Err(e);
            }
        };

        let mut active = ActiveSession {
            session_id,
            identity: identity.clone(),
            subscription,
            timeline: Timeline::from_history(history),
        };
        let history_len = active.timeline.len();

        let mut buffered = 0usize;
        while let Some(event) = active.subscription.try_recv() {
            if let ChannelEvent::Message(_) | ChannelEvent::Ack(_) = event {
                Self::apply_to(&mut active, event);
                buffered += 1;
            }
        }

        info!(session_id, history = history_len, buffered, "Session activated");
        self.active = Some(active);
        Ok(())
    }

    /// Leave the active session's room and drop its state.
    ///
    /// Returns the id of the session that was active.
    pub async fn deactivate(&mut self) -> Option<u64> {
        let active = self.active.take()?;
        self.channel.leave_room(active.session_id).await;
        self.channel.off(active.subscription.id());
        if active.timeline.pending_count() > 0 {
            debug!(
                session_id = active.session_id,
                discarded = active.timeline.pending_count(),
                "Discarding unconfirmed messages"
            );
        }
        info!(session_id = active.session_id, "Session deactivated");
        Some(active.session_id)
    }

    /// Send a message into the active session with optimistic local echo.
    ///
    /// The local copy appears immediately as pending. If transmission fails
    /// it is marked failed and the error returned.
    pub async fn send(&mut self, content: &str) -> Result<Uuid, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("message must not be empty".to_string()));
        }
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| ChatError::Validation("no chat session is selected".to_string()))?;

        let client_id = Uuid::now_v7();
        let sender_id = active.identity.user_id();
        active.timeline.push_optimistic(Message::optimistic(
            active.session_id,
            sender_id,
            client_id,
            content.to_string(),
        ));

        match self
            .channel
            .send(active.session_id, content, sender_id, client_id)
            .await
        {
            Ok(()) => Ok(client_id),
            Err(e) => {
                warn!(session_id = active.session_id, error = %e, "Message not sent");
                active.timeline.mark_failed(client_id);
                Err(e)
            }
        }
    }

    /// Wait for the next channel event for the active session.
    ///
    /// Pends forever while no session is active; returns `None` once the
    /// channel manager has gone away.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        match self.active.as_mut() {
            Some(active) => active.subscription.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Apply one channel event. A reconnect triggers a history resync.
    pub async fn handle(&mut self, event: ChannelEvent) -> SyncUpdate {
        if matches!(event, ChannelEvent::Reconnected) {
            return match self.resync().await {
                Ok(added) => SyncUpdate::Resynced(added),
                Err(e) => {
                    warn!(error = %e, "History resync failed");
                    SyncUpdate::Ignored
                }
            };
        }
        match self.active.as_mut() {
            Some(active) => Self::apply_to(active, event),
            None => SyncUpdate::Ignored,
        }
    }

    /// Re-fetch history and merge messages missing by server id.
    pub async fn resync(&mut self) -> Result<usize, ChatError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(0);
        };
        let history = self
            .store
            .fetch_history(active.session_id, &active.identity)
            .await?;
        let added = active.timeline.merge_history(history);
        info!(session_id = active.session_id, added, "Session history resynced");
        Ok(added)
    }

    /// Mark messages unconfirmed for longer than `timeout` as failed.
    pub fn expire_pending(&mut self, timeout: Duration) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let expired = active.timeline.expire_pending(Utc::now(), timeout);
        if expired > 0 {
            warn!(session_id = active.session_id, expired, "Messages were not confirmed in time");
        }
        expired
    }

    fn apply_to(active: &mut ActiveSession, event: ChannelEvent) -> SyncUpdate {
        match event {
            ChannelEvent::Message(incoming) => {
                if incoming
                    .chat_session_id
                    .is_some_and(|id| id != active.session_id)
                {
                    debug!(
                        session_id = ?incoming.chat_session_id,
                        active = active.session_id,
                        "Dropping message for another session"
                    );
                    return SyncUpdate::Ignored;
                }
                let mut message = incoming.into_message(active.identity.user_id());
                message.session_id = Some(active.session_id);
                match active.timeline.apply_server_copy(message) {
                    Applied::Inserted => SyncUpdate::Inserted,
                    Applied::Reconciled => SyncUpdate::Confirmed,
                    Applied::Duplicate => SyncUpdate::Ignored,
                }
            }
            ChannelEvent::Ack(ack) => {
                if active.timeline.apply_ack(&ack) {
                    SyncUpdate::Confirmed
                } else {
                    SyncUpdate::Ignored
                }
            }
            ChannelEvent::Reconnected => SyncUpdate::Ignored,
        }
    }
}
