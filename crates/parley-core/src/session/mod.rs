//! Chat session access for Parley.
//!
//! This module defines the `SessionStore` trait that the infrastructure
//! layer implements over the CMS REST API, and a thin service that validates
//! input before it reaches the store.

pub mod service;
pub mod store;

pub use service::SessionService;
pub use store::{SessionStore, validate_title};
