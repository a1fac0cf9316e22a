//! Typed provider construction keyed by kind tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::provider::{GenericProvider, ProviderClient};

/// Builds a provider client from its effective configuration.
pub type Constructor =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn ProviderClient>, Error> + Send + Sync>;

/// Maps provider kind tags (the `className` setting) to constructors.
#[derive(Clone, Default)]
pub struct ProviderFactory {
    constructors: HashMap<String, Constructor>,
}

impl ProviderFactory {
    /// An empty factory. Every `className` is rejected until kinds are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory knowing the built-in provider kinds.
    pub fn with_defaults() -> Self {
        Self::new().with_kind(GenericProvider::KIND, |config| {
            Ok(Arc::new(GenericProvider::from_config(config)?) as Arc<dyn ProviderClient>)
        })
    }

    /// Register a constructor for `kind`, replacing any previous one.
    pub fn with_kind<F>(mut self, kind: &str, constructor: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn ProviderClient>, Error> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(constructor));
        self
    }

    /// Whether `kind` can be built.
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Build the provider for a normalized configuration.
    ///
    /// Returns `None` when the kind is unknown.
    pub fn build(&self, config: &ProviderConfig) -> Option<Result<Arc<dyn ProviderClient>, Error>> {
        self.constructors
            .get(&config.kind)
            .map(|constructor| constructor(config))
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut kinds: Vec<&String> = self.constructors.keys().collect();
        kinds.sort();
        f.debug_struct("ProviderFactory").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, StubProvider};
    use serde_json::json;

    #[test]
    fn test_defaults_know_generic() {
        let factory = ProviderFactory::with_defaults();
        assert!(factory.contains("generic"));
        assert!(!factory.contains("League\\OAuth2\\Client\\Provider\\GenericProvider"));
    }

    #[test]
    fn test_empty_factory_knows_nothing() {
        assert!(!ProviderFactory::new().contains("generic"));
    }

    #[test]
    fn test_build_uses_registered_constructor() {
        let factory = ProviderFactory::new().with_kind("stub", |_| {
            Ok(Arc::new(StubProvider::returning(json!({"access_token": "t"}))) as Arc<dyn ProviderClient>)
        });
        let mut github = config("github", json!({}));
        github.kind = "stub".to_string();

        let provider = factory.build(&github).unwrap().unwrap();
        assert_eq!(provider.kind(), "stub");
    }

    #[test]
    fn test_build_unknown_kind_is_none() {
        let mut github = config("github", json!({}));
        github.kind = "missing".to_string();

        assert!(ProviderFactory::with_defaults().build(&github).is_none());
    }

    #[test]
    fn test_debug_lists_kinds() {
        let factory = ProviderFactory::with_defaults();
        assert_eq!(format!("{:?}", factory), "ProviderFactory { kinds: [\"generic\"] }");
    }
}
