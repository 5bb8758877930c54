//! Client logic and port trait definitions for Parley.
//!
//! This crate defines the "ports" (session store, auth API, credential store,
//! transport) that the infrastructure layer implements, plus the logic that
//! runs over them: the channel manager, the session synchronizer, the
//! identity gate, and the route guard. It depends only on `parley-types` --
//! never on `parley-infra` or any HTTP/socket crate.

pub mod channel;
pub mod identity;
pub mod route;
pub mod session;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
