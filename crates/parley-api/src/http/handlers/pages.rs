//! Guarded page data: the dashboard and the chat view.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use parley_core::identity::AuthApi;
use parley_types::identity::Identity;

use crate::http::cookie::session_token;
use crate::http::error::{AppError, NOT_AUTHENTICATED};
use crate::state::AppState;

/// Resolve the cookie's token into a full identity via `/users/me`.
async fn identity_from_cookie(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let token = session_token(headers)
        .map(SecretString::from)
        .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.to_string()))?;
    let user = state.cms.current_user(&token).await?;
    Ok(Identity::new(user, token))
}

/// GET /dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let identity = identity_from_cookie(&state, &headers).await?;
    let sessions = state.session_service.list_sessions(&identity).await?;
    Ok(Json(json!({
        "user": identity.user,
        "sessions": sessions,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    /// Session to open; only the session list is returned without it.
    pub session: Option<u64>,
}

/// GET /chat?session=<id>
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ChatQuery>,
) -> Result<Json<Value>, AppError> {
    let identity = identity_from_cookie(&state, &headers).await?;
    let sessions = state.session_service.list_sessions(&identity).await?;

    let (active, messages) = match query.session {
        None => (None, Vec::new()),
        Some(id) => {
            let session = sessions
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))?;
            let messages = state.session_service.history(id, &identity).await?;
            (Some(session), messages)
        }
    };

    Ok(Json(json!({
        "user": identity.user,
        "sessions": sessions,
        "activeSession": active,
        "messages": messages,
    })))
}
