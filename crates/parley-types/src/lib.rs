//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the Parley client:
//! Identity, ChatSession, Message, the real-time channel frames, client
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
