//! Sign-in, sign-up, logout and session check.
//!
//! Sign-in and sign-up forward to the CMS and, on success, hand the JWT to
//! the browser as the `jwt` cookie. The body always says whether it worked:
//! `{success: true, user}` or `{success: false, error}`.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use parley_core::identity::AuthApi;
use parley_types::error::ChatError;
use parley_types::identity::{Credentials, Identity, Registration, User};

use crate::http::cookie::{expired_cookie, session_cookie, session_token};
use crate::http::error::{AppError, NOT_AUTHENTICATED};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// POST /auth/signin
pub async fn sign_in(State(state): State<AppState>, Json(body): Json<SignInBody>) -> Response {
    let credentials = Credentials::new(body.identifier, body.password);
    let result = match credentials.validate() {
        Ok(()) => state.cms.sign_in(&credentials).await,
        Err(e) => Err(e),
    };
    session_response(&state, result)
}

/// POST /auth/signup
pub async fn sign_up(State(state): State<AppState>, Json(body): Json<SignUpBody>) -> Response {
    let registration = Registration::new(body.username, body.email, body.password);
    let result = match registration.validate() {
        Ok(()) => state.cms.sign_up(&registration).await,
        Err(e) => Err(e),
    };
    session_response(&state, result)
}

fn session_response(state: &AppState, result: Result<Identity, ChatError>) -> Response {
    match result {
        Ok(identity) => {
            info!(user_id = identity.user_id(), "Gateway session issued");
            let cookie = session_cookie(
                identity.token().expose_secret(),
                state.config.cookie_secure,
            );
            (
                [(SET_COOKIE, cookie)],
                Json(json!({"success": true, "user": identity.user})),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Gateway authentication failed");
            let status = AppError::from(e.clone()).status();
            (
                status,
                Json(json!({"success": false, "error": e.user_message()})),
            )
                .into_response()
        }
    }
}

/// POST /auth/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, expired_cookie(state.config.cookie_secure))],
        Json(json!({"success": true})),
    )
        .into_response()
}

/// GET /api/auth/check
///
/// 401 without a cookie; otherwise the CMS profile for the cookie's token.
pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let token = session_token(&headers)
        .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.to_string()))?;
    let user = state.cms.current_user(&SecretString::from(token)).await?;
    Ok(Json(user))
}
