//! CmsClient -- concrete [`SessionStore`] and [`AuthApi`] for the CMS REST API.
//!
//! All content endpoints live under `{api_url}/api` and take the identity's
//! token as a Bearer header. Nothing is retried: each failure becomes a
//! `ChatError` carrying the CMS's own error text when the body has one.

use std::time::Duration;

use parley_core::identity::AuthApi;
use parley_core::session::SessionStore;
use parley_types::chat::{ChatSession, Message};
use parley_types::config::ClientConfig;
use parley_types::error::ChatError;
use parley_types::identity::{Credentials, Identity, Registration, User};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::dto::{
    AuthResponse, CreateSessionData, CreateSessionRequest, Envelope, RegisterRequest,
    SignInRequest, decode_message, decode_session, error_message,
};

/// Entries requested per page when listing.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages followed for one listing.
const MAX_PAGES: u32 = 50;

/// REST client for the CMS.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference-counted.
#[derive(Clone)]
pub struct CmsClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl CmsClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::network(None, format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Send a request and map any non-success status to a `ChatError`.
    ///
    /// `context` is the message used when the body carries no error text.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, ChatError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChatError::network(None, format!("{context}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| context.to_string());
        debug!(status = status.as_u16(), %message, "CMS request failed");
        Err(match status.as_u16() {
            401 | 403 => ChatError::Auth(message),
            code => ChatError::network(Some(code), message),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, ChatError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ChatError::Decode(format!("{context}: {e}")))
    }

    /// GET a paginated collection, following pages until the last one.
    ///
    /// A listing that still has pages left after `MAX_PAGES` is an error
    /// rather than a silently truncated result.
    async fn fetch_all(
        &self,
        path: &str,
        query: &[(&str, String)],
        identity: &Identity,
        context: &str,
    ) -> Result<Vec<Value>, ChatError> {
        let mut entries = Vec::new();
        for page in 1..=MAX_PAGES {
            let request = self
                .client
                .get(self.url(path))
                .bearer_auth(identity.token().expose_secret())
                .query(query)
                .query(&[
                    ("pagination[page]", page.to_string()),
                    ("pagination[pageSize]", self.page_size.to_string()),
                ]);
            let response = self.execute(request, context).await?;
            let envelope: Envelope<Vec<Value>> = Self::read_json(response, context).await?;
            let more = envelope.has_more_pages();
            entries.extend(envelope.data);
            if !more {
                return Ok(entries);
            }
        }
        warn!(
            path,
            pages = MAX_PAGES,
            page_size = self.page_size,
            "Listing exceeds the page limit"
        );
        Err(ChatError::network(
            None,
            format!("{context}: more than {MAX_PAGES} pages of results"),
        ))
    }

    async fn authenticate<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> Result<Identity, ChatError> {
        let request = self.client.post(self.url(path)).json(body);
        let response = self.execute(request, context).await?;
        let auth: AuthResponse = Self::read_json(response, context).await?;
        Ok(Identity::new(auth.user, SecretString::from(auth.jwt)))
    }
}

impl SessionStore for CmsClient {
    async fn list_sessions(&self, identity: &Identity) -> Result<Vec<ChatSession>, ChatError> {
        let owner = identity.user_id();
        let entries = self
            .fetch_all(
                "/chat-sessions",
                &[
                    ("filters[user][id][$eq]", owner.to_string()),
                    ("sort", "createdAt:asc".to_string()),
                ],
                identity,
                "Failed to fetch chat sessions",
            )
            .await?;
        entries
            .into_iter()
            .map(|entry| decode_session(entry, Some(owner)))
            .collect()
    }

    async fn create_session(
        &self,
        title: &str,
        owner_id: u64,
        identity: &Identity,
    ) -> Result<ChatSession, ChatError> {
        let context = "Failed to create chat session";
        let body = CreateSessionRequest {
            data: CreateSessionData {
                title,
                user: owner_id,
            },
        };
        let request = self
            .client
            .post(self.url("/chat-sessions"))
            .bearer_auth(identity.token().expose_secret())
            .json(&body);
        let response = self.execute(request, context).await?;
        let envelope: Envelope<Value> = Self::read_json(response, context).await?;
        decode_session(envelope.data, Some(owner_id))
    }

    async fn delete_session(&self, session_key: &str, identity: &Identity) -> Result<(), ChatError> {
        let request = self
            .client
            .delete(self.url(&format!("/chat-sessions/{session_key}")))
            .bearer_auth(identity.token().expose_secret());
        self.execute(request, "Failed to delete chat session").await?;
        Ok(())
    }

    async fn fetch_history(
        &self,
        session_id: u64,
        identity: &Identity,
    ) -> Result<Vec<Message>, ChatError> {
        let entries = self
            .fetch_all(
                "/messages",
                &[
                    ("filters[chat_session][id][$eq]", session_id.to_string()),
                    ("sort", "createdAt:asc".to_string()),
                    ("populate", "user".to_string()),
                ],
                identity,
                "Failed to fetch messages",
            )
            .await?;
        let local_user = identity.user_id();
        entries
            .into_iter()
            .map(|entry| decode_message(entry, session_id, local_user))
            .collect()
    }
}

impl AuthApi for CmsClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, ChatError> {
        let body = SignInRequest {
            identifier: credentials.identifier.trim(),
            password: credentials.password.expose_secret(),
        };
        self.authenticate("/auth/local", &body, "Login failed")
            .await
            .map_err(|e| match e {
                // Bad credentials come back as a 400 validation error.
                ChatError::Network {
                    status: Some(400),
                    message,
                } => ChatError::Auth(message),
                other => other,
            })
    }

    async fn sign_up(&self, registration: &Registration) -> Result<Identity, ChatError> {
        let body = RegisterRequest {
            username: registration.username.trim(),
            email: registration.email.trim(),
            password: registration.password.expose_secret(),
        };
        self.authenticate("/auth/local/register", &body, "Signup failed")
            .await
    }

    async fn current_user(&self, token: &SecretString) -> Result<User, ChatError> {
        let context = "Failed to fetch user profile";
        let request = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(token.expose_secret());
        let response = self.execute(request, context).await?;
        Self::read_json(response, context).await
    }
}
