//! Alias based provider resolution.

mod factory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{ProviderConfig, Settings};
use crate::provider::ProviderClient;

pub use factory::{Constructor, ProviderFactory};

/// A provider client together with the configuration it was resolved from.
#[derive(Clone)]
pub struct ResolvedProvider {
    config: Arc<ProviderConfig>,
    client: Arc<dyn ProviderClient>,
}

impl ResolvedProvider {
    pub fn new(config: Arc<ProviderConfig>, client: Arc<dyn ProviderClient>) -> Self {
        Self { config, client }
    }

    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn client(&self) -> &dyn ProviderClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("alias", &self.config.alias)
            .field("kind", &self.client.kind())
            .finish()
    }
}

/// Validated provider configuration plus the means to build clients from it.
///
/// Immutable once built and safe to share between concurrently handled
/// requests. Clients are built on every resolve; caching for the duration of
/// a request is the job of the request's `AuthenticationFlow`.
pub struct ProviderRegistry {
    settings: Settings,
    factory: ProviderFactory,
    prebuilt: HashMap<String, ResolvedProvider>,
}

impl ProviderRegistry {
    pub fn new(settings: Settings, factory: ProviderFactory) -> Self {
        Self {
            settings,
            factory,
            prebuilt: HashMap::new(),
        }
    }

    /// Register an already constructed client under `alias`.
    ///
    /// It takes precedence over a configured provider with the same alias and
    /// only inherits the shared settings.
    pub fn with_client(mut self, alias: &str, client: Arc<dyn ProviderClient>) -> Self {
        let mut config = self.settings.shared_config(alias);
        config.kind = client.kind().to_string();
        self.prebuilt.insert(
            alias.to_string(),
            ResolvedProvider::new(Arc::new(config), client),
        );
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build every configured provider once, surfacing constructor errors at
    /// startup instead of on the first request.
    pub fn check_all(&self) -> Result<(), crate::Error> {
        for alias in self.settings.aliases() {
            if let Some(config) = self.settings.provider(alias) {
                if let Some(result) = self.factory.build(config) {
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Resolve `alias` to a provider client.
    ///
    /// Unknown or empty aliases, and providers whose construction fails, yield
    /// `None`: the request simply can't be authenticated by this registry.
    pub fn resolve(&self, alias: &str) -> Option<ResolvedProvider> {
        if alias.is_empty() {
            return None;
        }

        if let Some(provider) = self.prebuilt.get(alias) {
            return Some(provider.clone());
        }

        let Some(config) = self.settings.provider(alias) else {
            debug!("No provider configured for alias `{}`", alias);
            return None;
        };

        match self.factory.build(config)? {
            Ok(client) => Some(ResolvedProvider::new(Arc::clone(config), client)),
            Err(e) => {
                error!("Failed to build provider `{}`: {:?}", alias, e);
                None
            }
        }
    }
}
