//! Real-time channel: one multiplexed connection per identity, room
//! membership, message fan-out, and automatic reconnection.

pub mod backoff;
pub mod manager;
pub mod transport;

pub use backoff::backoff_delay;
pub use manager::{ChannelEvent, ChannelManager, ChannelNotice, MessageSubscription};
pub use transport::{Connection, Transport};
