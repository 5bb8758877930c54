//! Route-guard middleware.
//!
//! Runs before every route. Only the presence of the `jwt` cookie is
//! checked here, so a redirect never costs a CMS round trip.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use parley_core::route::RouteDecision;
use tracing::debug;

use super::cookie::session_token;
use crate::state::AppState;

pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let has_token = session_token(request.headers()).is_some();
    match state.route_guard.evaluate(request.uri().path(), has_token) {
        RouteDecision::Allow => next.run(request).await,
        RouteDecision::Redirect(location) => {
            debug!(path = %request.uri().path(), %location, has_token, "Route guard redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
