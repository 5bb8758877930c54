//! Route guard: decides whether a request path may proceed given only
//! whether the caller presented a session token.
//!
//! The decision is pure and never contacts the backend; token validity is
//! checked later by whatever handler serves the page.

use parley_types::config::RouteGuardConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Send the caller to this location instead.
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    config: RouteGuardConfig,
}

impl RouteGuard {
    pub fn new(config: RouteGuardConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, path: &str, has_token: bool) -> RouteDecision {
        if !has_token && self.is_protected(path) {
            return RouteDecision::Redirect(self.config.sign_in_path.clone());
        }
        if has_token && self.config.redirect_authenticated && self.is_auth_page(path) {
            return RouteDecision::Redirect(self.config.landing_path.clone());
        }
        RouteDecision::Allow
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.config
            .protected_prefixes
            .iter()
            .any(|prefix| under_prefix(path, prefix))
    }

    pub fn is_auth_page(&self, path: &str) -> bool {
        self.config
            .auth_pages
            .iter()
            .any(|page| under_prefix(path, page))
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(RouteGuardConfig::default())
    }
}

/// Segment-aware prefix match: `/chat` covers `/chat` and `/chat/3`
/// but not `/chatter`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}
