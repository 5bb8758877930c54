//! In-memory fakes for the core ports, shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parley_types::channel::{ClientEvent, IncomingMessage, ServerEvent};
use parley_types::chat::{ChatSession, DeliveryStatus, Message, MessageOrigin};
use parley_types::config::ReconnectPolicy;
use parley_types::error::ChatError;
use parley_types::identity::{Credentials, Identity, Registration, StoredCredentials, User};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use crate::channel::{Connection, Transport};
use crate::identity::{AuthApi, CredentialStore};
use crate::session::SessionStore;

pub fn user(id: u64) -> User {
    User {
        id,
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
    }
}

pub fn identity(id: u64) -> Identity {
    Identity::new(user(id), SecretString::from(format!("token-{id}")))
}

/// Fixed timestamp `secs` seconds into a test day.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000 + secs, 0).single().unwrap()
}

pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay_ms: 5,
        max_delay_ms: 20,
        multiplier: 2.0,
        max_attempts: None,
    }
}

pub fn incoming(id: u64, content: &str, session_id: u64, user_id: u64) -> IncomingMessage {
    IncomingMessage {
        id,
        content: content.to_string(),
        created_at: Utc::now(),
        chat_session_id: Some(session_id),
        user_id: Some(user_id),
        client_id: None,
    }
}

pub fn receive_frame(id: u64, content: &str, session_id: u64, user_id: u64) -> ServerEvent {
    ServerEvent::ReceiveMessage(incoming(id, content, session_id, user_id))
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    sessions: Vec<ChatSession>,
    messages: HashMap<u64, Vec<StoredMessage>>,
    next_id: u64,
    calls: usize,
    history_calls: usize,
    fail_history: bool,
    history_delay: Option<Duration>,
}

struct StoredMessage {
    id: u64,
    sender_id: u64,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    /// Total store calls made so far.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn history_calls(&self) -> usize {
        self.state.lock().unwrap().history_calls
    }

    pub fn fail_history(&self, fail: bool) {
        self.state.lock().unwrap().fail_history = fail;
    }

    /// Make history fetches take `delay` before answering.
    pub fn delay_history(&self, delay: Duration) {
        self.state.lock().unwrap().history_delay = Some(delay);
    }

    pub fn add_message(
        &self,
        session_id: u64,
        id: u64,
        sender_id: u64,
        content: &str,
        created_at: DateTime<Utc>,
    ) {
        self.state
            .lock()
            .unwrap()
            .messages
            .entry(session_id)
            .or_default()
            .push(StoredMessage {
                id,
                sender_id,
                content: content.to_string(),
                created_at,
            });
    }
}

impl SessionStore for FakeStore {
    async fn list_sessions(&self, identity: &Identity) -> Result<Vec<ChatSession>, ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.owner_id == Some(identity.user_id()))
            .cloned()
            .collect())
    }

    async fn create_session(
        &self,
        title: &str,
        owner_id: u64,
        _identity: &Identity,
    ) -> Result<ChatSession, ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.next_id += 1;
        let session = ChatSession {
            id: state.next_id,
            document_id: Some(format!("doc{}", state.next_id)),
            title: title.to_string(),
            owner_id: Some(owner_id),
            created_at: Utc::now(),
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn delete_session(
        &self,
        session_key: &str,
        _identity: &Identity,
    ) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let before = state.sessions.len();
        state.sessions.retain(|s| !s.matches_key(session_key));
        if state.sessions.len() == before {
            return Err(ChatError::network(Some(404), "Not Found"));
        }
        Ok(())
    }

    async fn fetch_history(
        &self,
        session_id: u64,
        identity: &Identity,
    ) -> Result<Vec<Message>, ChatError> {
        let delay = self.state.lock().unwrap().history_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.history_calls += 1;
        if state.fail_history {
            return Err(ChatError::network(Some(500), "Internal Server Error"));
        }
        let messages = state
            .messages
            .get(&session_id)
            .map(|list| {
                list.iter()
                    .map(|m| Message {
                        id: Some(m.id),
                        client_id: None,
                        session_id: Some(session_id),
                        sender_id: Some(m.sender_id),
                        content: m.content.clone(),
                        created_at: m.created_at,
                        origin: MessageOrigin::from_sender(Some(m.sender_id), identity.user_id()),
                        status: DeliveryStatus::Confirmed,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TransportState {
    sent: Mutex<Vec<ClientEvent>>,
    server: Mutex<Option<mpsc::UnboundedSender<Option<String>>>>,
    connects: AtomicUsize,
    failures_left: AtomicUsize,
}

/// Transport whose "server" side is driven by the test.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<TransportState>,
}

impl FakeTransport {
    /// Frames the client has written, decoded.
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    /// Push a server event to the current connection.
    pub fn push(&self, event: &ServerEvent) -> bool {
        self.push_raw(&serde_json::to_string(event).unwrap())
    }

    pub fn push_raw(&self, frame: &str) -> bool {
        match self.state.server.lock().unwrap().as_ref() {
            Some(tx) => tx.send(Some(frame.to_string())).is_ok(),
            None => false,
        }
    }

    /// Simulate the server closing the current connection.
    pub fn drop_connection(&self) {
        if let Some(tx) = self.state.server.lock().unwrap().take() {
            let _ = tx.send(None);
        }
    }
}

pub struct FakeConnection {
    rx: mpsc::UnboundedReceiver<Option<String>>,
    state: Arc<TransportState>,
}

impl Transport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(&self, _identity: &Identity) -> Result<FakeConnection, ChatError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ChatError::network(None, "connection refused"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.server.lock().unwrap() = Some(tx);
        Ok(FakeConnection {
            rx,
            state: Arc::clone(&self.state),
        })
    }
}

impl Connection for FakeConnection {
    async fn send_text(&mut self, frame: String) -> Result<(), ChatError> {
        let event: ClientEvent = serde_json::from_str(&frame).unwrap();
        self.state.sent.lock().unwrap().push(event);
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, ChatError>> {
        match self.rx.recv().await {
            Some(Some(frame)) => Some(Ok(frame)),
            Some(None) | None => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

// ---------------------------------------------------------------------------
// Auth API and credential storage
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AuthState {
    accounts: Vec<(User, String)>,
    revoked: Vec<String>,
    outage: bool,
    calls: usize,
}

/// Auth backend with accounts registered in memory.
///
/// Tokens are `token-{user_id}`.
#[derive(Clone, Default)]
pub struct FakeAuth {
    state: Arc<Mutex<AuthState>>,
}

impl FakeAuth {
    pub fn with_account(self, user: User, password: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .push((user, password.to_string()));
        self
    }

    pub fn revoke(&self, token: &str) {
        self.state.lock().unwrap().revoked.push(token.to_string());
    }

    pub fn set_outage(&self, outage: bool) {
        self.state.lock().unwrap().outage = outage;
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

impl AuthApi for FakeAuth {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.outage {
            return Err(ChatError::network(Some(503), "Service Unavailable"));
        }
        state
            .accounts
            .iter()
            .find(|(user, password)| {
                (user.email == credentials.identifier || user.username == credentials.identifier)
                    && password == credentials.password.expose_secret()
            })
            .map(|(user, _)| identity(user.id))
            .ok_or_else(|| ChatError::Auth("Invalid identifier or password".to_string()))
    }

    async fn sign_up(&self, registration: &Registration) -> Result<Identity, ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.outage {
            return Err(ChatError::network(Some(503), "Service Unavailable"));
        }
        if state.accounts.iter().any(|(u, _)| u.email == registration.email) {
            return Err(ChatError::network(
                Some(400),
                "Email or Username are already taken",
            ));
        }
        let id = state.accounts.len() as u64 + 100;
        let user = User {
            id,
            username: registration.username.clone(),
            email: registration.email.clone(),
        };
        state
            .accounts
            .push((user, registration.password.expose_secret().to_string()));
        Ok(identity(id))
    }

    async fn current_user(&self, token: &SecretString) -> Result<User, ChatError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.outage {
            return Err(ChatError::network(None, "connection refused"));
        }
        let token = token.expose_secret();
        if state.revoked.iter().any(|t| t == token) {
            return Err(ChatError::Auth("Invalid credentials".to_string()));
        }
        state
            .accounts
            .iter()
            .map(|(user, _)| user)
            .find(|user| format!("token-{}", user.id) == token)
            .cloned()
            .ok_or_else(|| ChatError::Auth("Invalid credentials".to_string()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCredentials {
    stored: Arc<Mutex<Option<StoredCredentials>>>,
}

impl MemoryCredentials {
    pub fn stored(&self) -> Option<StoredCredentials> {
        self.stored.lock().unwrap().clone()
    }

    pub fn preload(&self, identity: &Identity) {
        *self.stored.lock().unwrap() = Some(StoredCredentials::from(identity));
    }
}

impl CredentialStore for MemoryCredentials {
    async fn load(&self) -> Result<Option<StoredCredentials>, ChatError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ChatError> {
        *self.stored.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ChatError> {
        *self.stored.lock().unwrap() = None;
        Ok(())
    }
}
