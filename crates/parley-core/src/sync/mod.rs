//! Session synchronizer and the message timeline it maintains.

pub mod synchronizer;
pub mod timeline;

pub use synchronizer::{SessionSynchronizer, SyncUpdate};
pub use timeline::{Applied, Timeline};
