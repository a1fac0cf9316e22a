use async_trait::async_trait;
use events::{AuthEvent, EventHandler, EventPublisher};
use log::*;
use oauth_flow::config::normalize;
use oauth_flow::registry::{ProviderFactory, ProviderRegistry};
use serde_json::Value;
use service::{config::Config, logging::Logger, providers};
use std::sync::Arc;

/// Writes every authentication lifecycle event to the log.
///
/// It never answers `newUser`, so user creation stays with listeners a host
/// registers next to it.
struct AuditListener;

#[async_trait]
impl EventHandler for AuditListener {
    async fn handle(&self, event: &AuthEvent) -> Option<Value> {
        match event {
            AuthEvent::AfterIdentify {
                provider_alias,
                provider_kind,
                ..
            } => info!(
                "{}: identified through `{}` ({})",
                event.name(),
                provider_alias,
                provider_kind
            ),
            AuthEvent::NewUser { provider_alias, .. } => {
                info!("{}: requested for `{}`", event.name(), provider_alias)
            }
        }
        None
    }
}

fn build_registry(config: &Config) -> Result<ProviderRegistry, Box<dyn std::error::Error>> {
    let document = providers::load_document(config.providers_config())?;
    let factory = ProviderFactory::with_defaults();
    let settings = normalize(&document, &factory)?;

    let registry = ProviderRegistry::new(settings, factory);
    registry.check_all()?;

    Ok(registry)
}

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
    }

    info!("Starting up OAuth gateway in [{}] mode", config.runtime_env());

    let registry = match build_registry(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!(
                "Invalid provider configuration [{}]: {e}",
                config.providers_config().display()
            );
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {} OAuth provider(s): {}",
        registry.settings().len(),
        registry.settings().aliases().collect::<Vec<_>>().join(", ")
    );

    let events = EventPublisher::new().with_handler(Arc::new(AuditListener));
    let app_state = web::AppState::new(config, registry, events);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
