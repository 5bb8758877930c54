//! Application state wiring all services together.
//!
//! AppState holds the concrete instances used by both the CLI and the HTTP
//! gateway. Core services are generic over their ports; AppState pins them
//! to the infra implementations (CMS REST client, credential file,
//! WebSocket transport).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use parley_core::channel::ChannelManager;
use parley_core::identity::IdentityGate;
use parley_core::route::RouteGuard;
use parley_core::session::SessionService;
use parley_infra::cms::CmsClient;
use parley_infra::config::load_client_config;
use parley_infra::credentials::FileCredentialStore;
use parley_infra::filesystem::resolve_data_dir;
use parley_infra::socket::WebSocketTransport;
use parley_types::config::ClientConfig;

pub type ConcreteChannel = ChannelManager<WebSocketTransport>;

pub type ConcreteGate = IdentityGate<CmsClient, FileCredentialStore, WebSocketTransport>;

pub type ConcreteSessionService = SessionService<CmsClient>;

/// Shared application state.
///
/// Cheap to clone; every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub cms: CmsClient,
    pub channel: Arc<ConcreteChannel>,
    pub gate: Arc<ConcreteGate>,
    pub session_service: Arc<ConcreteSessionService>,
    pub route_guard: Arc<RouteGuard>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, load `config.toml`, and wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_client_config(&data_dir).await;
        tracing::debug!(
            api_url = %config.api_url,
            socket_url = %config.socket_url,
            data_dir = %data_dir.display(),
            "Configuration loaded"
        );
        Self::from_config(config, data_dir)
    }

    /// Wire services from an already loaded configuration.
    pub fn from_config(config: ClientConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let cms = CmsClient::new(&config).map_err(|e| anyhow::anyhow!(e.user_message()))?;
        let transport = WebSocketTransport::new(&config.socket_url)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        let channel = Arc::new(ChannelManager::new(transport, config.reconnect.clone()));

        // One-shot commands never need the channel; `chat` starts it itself.
        let gate = IdentityGate::new(
            cms.clone(),
            FileCredentialStore::in_data_dir(&data_dir),
            Arc::clone(&channel),
        )
        .with_channel_autostart(false);

        Ok(Self {
            route_guard: Arc::new(RouteGuard::new(config.routes.clone())),
            session_service: Arc::new(SessionService::new(cms.clone())),
            gate: Arc::new(gate),
            channel,
            cms,
            config: Arc::new(config),
            data_dir,
        })
    }
}
