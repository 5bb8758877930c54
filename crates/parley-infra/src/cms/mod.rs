//! Client for the headless CMS REST API.
//!
//! One `CmsClient` serves both the `SessionStore` and `AuthApi` ports.

pub mod client;
pub mod dto;

pub use client::CmsClient;
