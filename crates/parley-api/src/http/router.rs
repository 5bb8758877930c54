//! Axum router for the auth gateway.
//!
//! Every route, including the 404 fallback, sits behind the route-guard
//! middleware. Request tracing comes from tower-http.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::http::{guard, handlers};
use crate::state::AppState;

/// Build the gateway router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Session cookie
        .route("/auth/signin", post(handlers::auth::sign_in))
        .route("/auth/signup", post(handlers::auth::sign_up))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/check", get(handlers::auth::check))
        // Guarded pages
        .route("/dashboard", get(handlers::pages::dashboard))
        .route("/chat", get(handlers::pages::chat))
        .route("/health", get(health_check))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::route_guard,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness probe, no cookie required.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::extract::State;
    use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{HeaderMap, Method, Request};
    use axum::middleware::Next;
    use axum::response::Response;
    use tower::ServiceExt;

    use parley_types::config::ClientConfig;

    const TOKEN: &str = "jwt-7";

    fn luna() -> Value {
        json!({"id": 7, "username": "luna", "email": "luna@example.com"})
    }

    async fn count(
        State(hits): State<Arc<AtomicUsize>>,
        request: axum::extract::Request,
        next: Next,
    ) -> Response {
        hits.fetch_add(1, Ordering::SeqCst);
        next.run(request).await
    }

    async fn cms_sign_in(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["identifier"] == "luna@example.com" && body["password"] == "moon" {
            (StatusCode::OK, Json(json!({"jwt": TOKEN, "user": luna()})))
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"data": null, "error": {"status": 400, "message": "Invalid identifier or password"}})),
            )
        }
    }

    fn bearer_ok(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .is_some_and(|v| v == format!("Bearer {TOKEN}").as_str())
    }

    async fn cms_me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        if bearer_ok(&headers) {
            (StatusCode::OK, Json(luna()))
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"status": 401, "message": "Missing or invalid credentials"}})),
            )
        }
    }

    async fn cms_sessions() -> Json<Value> {
        Json(json!({
            "data": [{"id": 4, "Title": "Standup", "createdAt": "2025-03-01T10:00:00Z"}],
            "meta": {"pagination": {"page": 1, "pageCount": 1}}
        }))
    }

    async fn cms_messages() -> Json<Value> {
        Json(json!({
            "data": [{"id": 11, "Content": "hello", "createdAt": "2025-03-01T10:00:05Z", "user": {"id": 7}}]
        }))
    }

    /// Start a fake CMS and build a gateway pointed at it.
    async fn gateway() -> (Router, Arc<AtomicUsize>, tempfile::TempDir) {
        let hits = Arc::new(AtomicUsize::new(0));
        let cms = Router::new()
            .route("/api/auth/local", post(cms_sign_in))
            .route("/api/users/me", get(cms_me))
            .route("/api/chat-sessions", get(cms_sessions))
            .route("/api/messages", get(cms_messages))
            .layer(middleware::from_fn_with_state(Arc::clone(&hits), count));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, cms).await.unwrap();
        });

        let dir = tempfile::TempDir::new().unwrap();
        let config = ClientConfig {
            api_url: format!("http://{addr}"),
            ..ClientConfig::default()
        };
        let state = AppState::from_config(config, dir.path().to_path_buf()).unwrap();
        (build_router(state), hits, dir)
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_cookie() {
        let (app, hits, _dir) = gateway().await;
        let response = app.oneshot(get_request("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn protected_page_without_cookie_redirects_without_backend_call() {
        let (app, hits, _dir) = gateway().await;
        for path in ["/dashboard", "/chat", "/dashboard/settings"] {
            let response = app.clone().oneshot(get_request(path, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
            assert_eq!(response.headers()[LOCATION], "/auth/signin");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_page_with_cookie_redirects_to_dashboard() {
        let (app, hits, _dir) = gateway().await;
        let body = json!({"identifier": "luna@example.com", "password": "moon"});
        let response = app
            .oneshot(post_json("/auth/signin", body, Some("jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/dashboard");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn check_without_cookie_is_401() {
        let (app, hits, _dir) = gateway().await;
        let response = app
            .oneshot(get_request("/api/auth/check", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"error": "Not authenticated"}));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn check_with_cookie_returns_profile() {
        let (app, _, _dir) = gateway().await;
        let response = app
            .oneshot(get_request("/api/auth/check", Some("jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "luna");
    }

    #[tokio::test]
    async fn sign_in_sets_session_cookie() {
        let (app, _, _dir) = gateway().await;
        let body = json!({"email": "luna@example.com", "password": "moon"});
        let response = app.oneshot(post_json("/auth/signin", body, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("jwt=jwt-7;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=604800"));

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["id"], 7);
    }

    #[tokio::test]
    async fn failed_sign_in_reports_message_without_cookie() {
        let (app, _, _dir) = gateway().await;
        let body = json!({"identifier": "luna@example.com", "password": "sun"});
        let response = app.oneshot(post_json("/auth/signin", body, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "error": "Invalid identifier or password"})
        );
    }

    #[tokio::test]
    async fn empty_sign_in_fields_never_reach_cms() {
        let (app, hits, _dir) = gateway().await;
        let body = json!({"identifier": "", "password": ""});
        let response = app.oneshot(post_json("/auth/signin", body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logout_expires_cookie() {
        let (app, _, _dir) = gateway().await;
        let response = app
            .oneshot(post_json("/auth/logout", json!({}), Some("jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn dashboard_lists_sessions() {
        let (app, _, _dir) = gateway().await;
        let response = app
            .oneshot(get_request("/dashboard", Some("theme=dark; jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["user"]["username"], "luna");
        assert_eq!(json["sessions"][0]["title"], "Standup");
    }

    #[tokio::test]
    async fn chat_page_includes_history_for_owned_session() {
        let (app, _, _dir) = gateway().await;
        let response = app
            .clone()
            .oneshot(get_request("/chat?session=4", Some("jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["activeSession"]["id"], 4);
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["messages"][0]["origin"], "local");

        let response = app
            .oneshot(get_request("/chat?session=99", Some("jwt=jwt-7")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stale_cookie_on_page_is_401() {
        let (app, _, _dir) = gateway().await;
        let response = app
            .oneshot(get_request("/dashboard", Some("jwt=expired")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
