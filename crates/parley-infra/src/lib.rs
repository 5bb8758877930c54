//! Infrastructure layer for Parley.
//!
//! Contains implementations of the port traits defined in `parley-core`:
//! the CMS REST client (sessions, history, auth), the WebSocket transport
//! for the real-time channel, file-backed credential storage, and the
//! configuration loader.

pub mod cms;
pub mod config;
pub mod credentials;
pub mod filesystem;
pub mod socket;
