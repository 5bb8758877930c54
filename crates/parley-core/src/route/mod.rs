//! Path-based access policy shared by the gateway middleware.

pub mod guard;

pub use guard::{RouteDecision, RouteGuard};
