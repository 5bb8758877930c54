//! The displayed message sequence for one active session.
//!
//! `Timeline` is pure data: no I/O, no clocks beyond what callers pass in.
//! It keeps messages ordered by creation time, holds each server id at most
//! once, and tracks optimistic local messages until the server confirms them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parley_types::channel::MessageAck;
use parley_types::chat::{DeliveryStatus, Message, MessageOrigin};
use uuid::Uuid;

/// What applying a server copy did to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new message was inserted.
    Inserted,
    /// A pending optimistic message was replaced by its server copy.
    Reconciled,
    /// The server id was already present.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    /// Pending optimistic messages: client id -> time sent.
    pending: HashMap<Uuid, DateTime<Utc>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from fetched history, in server order.
    pub fn from_history(history: Vec<Message>) -> Self {
        let mut timeline = Self::new();
        for message in history {
            timeline.apply_server_copy(message);
        }
        timeline
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.messages.iter().any(|m| m.id == Some(id))
    }

    /// Append an optimistic local message at the tail.
    pub fn push_optimistic(&mut self, message: Message) {
        if let Some(client_id) = message.client_id {
            self.pending.insert(client_id, message.created_at);
        }
        self.messages.push(message);
    }

    /// Apply a server-confirmed message (history entry or live push).
    ///
    /// A message whose id is already present is dropped. Otherwise it
    /// replaces the pending local copy it confirms, matched by client id
    /// or, failing that, by the oldest pending message with identical
    /// content from the same sender (or from any sender when the copy
    /// carries none). Anything else is inserted by time.
    pub fn apply_server_copy(&mut self, message: Message) -> Applied {
        if let Some(id) = message.id {
            if self.contains_id(id) {
                return Applied::Duplicate;
            }
        }

        if let Some(index) = self.pending_match(&message) {
            let removed = self.messages.remove(index);
            if let Some(client_id) = removed.client_id {
                self.pending.remove(&client_id);
            }
            let confirmed = Message {
                client_id: removed.client_id,
                origin: MessageOrigin::Local,
                status: DeliveryStatus::Confirmed,
                ..message
            };
            self.insert_by_time(confirmed);
            return Applied::Reconciled;
        }

        self.insert_by_time(message);
        Applied::Inserted
    }

    /// Confirm a pending message from a delivery acknowledgment.
    ///
    /// Returns `false` when no pending message carries the client id.
    pub fn apply_ack(&mut self, ack: &MessageAck) -> bool {
        if self.pending.remove(&ack.client_id).is_none() {
            return false;
        }
        let Some(index) = self
            .messages
            .iter()
            .position(|m| m.client_id == Some(ack.client_id))
        else {
            return false;
        };
        if self.contains_id(ack.id) {
            // The echo already landed as a separate entry; keep that one.
            self.messages.remove(index);
            return true;
        }
        let mut confirmed = self.messages.remove(index);
        confirmed.id = Some(ack.id);
        confirmed.status = DeliveryStatus::Confirmed;
        if let Some(created_at) = ack.created_at {
            confirmed.created_at = created_at;
        }
        self.insert_by_time(confirmed);
        true
    }

    /// Mark a pending message as failed. Returns `false` if it is not pending.
    pub fn mark_failed(&mut self, client_id: Uuid) -> bool {
        if self.pending.remove(&client_id).is_none() {
            return false;
        }
        for message in self.messages.iter_mut() {
            if message.client_id == Some(client_id) {
                message.status = DeliveryStatus::Failed;
            }
        }
        true
    }

    /// Fail every pending message sent at or before `now - timeout`.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let Some(cutoff) = now.checked_sub_signed(timeout) else {
            return 0;
        };
        let expired: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, sent_at)| **sent_at <= cutoff)
            .map(|(client_id, _)| *client_id)
            .collect();
        for client_id in &expired {
            self.mark_failed(*client_id);
        }
        expired.len()
    }

    /// Merge a re-fetched history, returning how many entries were new.
    pub fn merge_history(&mut self, history: Vec<Message>) -> usize {
        let mut added = 0;
        for message in history {
            if self.apply_server_copy(message) != Applied::Duplicate {
                added += 1;
            }
        }
        added
    }

    fn pending_match(&self, message: &Message) -> Option<usize> {
        if self.pending.is_empty() {
            return None;
        }
        if let Some(client_id) = message.client_id {
            if self.pending.contains_key(&client_id) {
                return self
                    .messages
                    .iter()
                    .position(|m| m.client_id == Some(client_id));
            }
        }
        // A known sender other than the local user never confirms a local send.
        // Echoes without a sender id match on content alone.
        if message.sender_id.is_some() && message.origin != MessageOrigin::Local {
            return None;
        }
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_pending() && m.content == message.content)
            .filter(|(_, m)| {
                message.sender_id.is_none()
                    || m.sender_id.is_none()
                    || m.sender_id == message.sender_id
            })
            .min_by_key(|(_, m)| m.created_at)
            .map(|(index, _)| index)
    }

    fn insert_by_time(&mut self, message: Message) {
        let index = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(index, message);
    }
}
