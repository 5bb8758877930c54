//! HTTP auth gateway for Parley.
//!
//! Axum router that signs users in against the CMS, keeps the token in an
//! HTTP-only `jwt` cookie, and guards page routes by cookie presence.

pub mod cookie;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod router;
