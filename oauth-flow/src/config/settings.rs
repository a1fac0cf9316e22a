//! Normalized provider settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::exchange::GrantType;

/// String keyed JSON map used for `options`, `collaborators` and extra keys.
pub type Map = serde_json::Map<String, Value>;

/// Options the provider client consumes itself and that must never leak into
/// the authorization URL.
pub const PROTECTED_OPTIONS: [&str; 3] = ["clientId", "clientSecret", "redirectUri"];

/// Effective configuration of one provider after merging built-in defaults,
/// shared settings and the provider entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderConfig {
    /// Key of this provider under `providers`.
    pub alias: String,
    /// Factory tag selecting the provider implementation (`className`).
    pub kind: String,
    /// Provider options (`clientId`, `clientSecret`, `redirectUri`, `grant`, `state`, ...).
    pub options: Map,
    /// Settings for collaborators such as the HTTP client.
    pub collaborators: Map,
    /// Destination field to dotted source path.
    pub map_fields: BTreeMap<String, String>,
    /// Other whitelisted keys inherited from the shared settings.
    pub extra: Map,
}

impl ProviderConfig {
    /// Get an option as a string, when it is a string or a number.
    pub fn option_str(&self, key: &str) -> Option<String> {
        self.options.get(key).and_then(scalar_to_string)
    }

    /// Whether the anti-CSRF state check is enabled for this provider.
    pub fn state_enabled(&self) -> bool {
        self.options.get("state").is_some_and(is_truthy)
    }

    /// The configured grant, defaulting to the authorization code grant.
    pub fn grant(&self) -> GrantType {
        self.option_str("grant")
            .map(|grant| GrantType::from_option(&grant))
            .unwrap_or_default()
    }

    /// Options safe to forward as authorization URL query parameters.
    ///
    /// Drops the credentials the provider client supplies on its own.
    pub fn query_params(&self) -> Map {
        self.options
            .iter()
            .filter(|(key, _)| !PROTECTED_OPTIONS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Validated configuration for every provider, keyed by alias.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    providers: BTreeMap<String, Arc<ProviderConfig>>,
    shared: Map,
}

impl Settings {
    pub(crate) fn new(providers: BTreeMap<String, Arc<ProviderConfig>>, shared: Map) -> Self {
        Self { providers, shared }
    }

    /// Look up a provider by alias.
    pub fn provider(&self, alias: &str) -> Option<&Arc<ProviderConfig>> {
        self.providers.get(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Configuration for a provider that was built outside the factory.
    ///
    /// Such providers only inherit the shared settings.
    pub(crate) fn shared_config(&self, alias: &str) -> ProviderConfig {
        let mut config = ProviderConfig {
            alias: alias.to_string(),
            ..ProviderConfig::default()
        };
        for (key, value) in &self.shared {
            match (key.as_str(), value) {
                ("options", Value::Object(options)) => config.options = options.clone(),
                ("collaborators", Value::Object(map)) => config.collaborators = map.clone(),
                ("className", Value::String(kind)) => config.kind = kind.clone(),
                ("mapFields", _) => {}
                _ => {
                    config.extra.insert(key.clone(), value.clone());
                }
            }
        }
        config
    }
}

/// Loose truthiness for configuration switches: `false`, `null`, `0`, `""`
/// and `"0"` are off, everything else is on.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
