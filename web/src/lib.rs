use events::{EventPublisher, ListenerPolicy};
use log::*;
use oauth_flow::flow::FlowOptions;
use oauth_flow::registry::ProviderRegistry;
use service::config::Config;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
mod error;
pub(crate) mod extractors;
mod router;

pub use error::{Error, Result};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub events: EventPublisher,
    registry: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(config: Config, registry: ProviderRegistry, events: EventPublisher) -> Self {
        Self {
            config,
            events,
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.registry)
    }

    /// Per-request flow settings derived from the host configuration.
    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            exchange_timeout: self.config.exchange_timeout(),
            listener_policy: if self.config.strict_event_listeners {
                ListenerPolicy::Strict
            } else {
                ListenerPolicy::Lenient
            },
        }
    }
}

/// The gateway's router with the session layer applied.
pub fn app(app_state: AppState) -> axum::Router {
    let session_expiry = i64::try_from(app_state.config.backend_session_expiry_seconds)
        .unwrap_or(i64::MAX);
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(app_state.config.is_production())
        .with_expiry(Expiry::OnInactivity(Duration::seconds(session_expiry)));

    router::define_routes(app_state).layer(session_layer)
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = app_state.config.port;

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("Server starting... listening for connections on http://{host}:{port}");

    axum::serve(listener, app(app_state)).await
}
