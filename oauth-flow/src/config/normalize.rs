//! Normalization and validation of raw provider configuration trees.
//!
//! The raw tree looks like:
//!
//! ```json
//! {
//!     "options": { "state": true },
//!     "providers": {
//!         "github": {
//!             "className": "generic",
//!             "options": { "clientId": "...", "clientSecret": "...", "redirectUri": "..." }
//!         }
//!     }
//! }
//! ```
//!
//! Every top-level key other than `providers` is a shared setting merged into
//! each provider. Precedence is provider entry > shared settings > built-in
//! defaults, and the `options` and `collaborators` maps merge key by key.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use super::settings::{Map, ProviderConfig, Settings};
use crate::error::{config_error, ConfigErrorKind, Error};
use crate::registry::ProviderFactory;

const CLASS_NAME: &str = "className";
const OPTIONS: &str = "options";
const COLLABORATORS: &str = "collaborators";
const MAP_FIELDS: &str = "mapFields";
const PROVIDERS: &str = "providers";

/// Keys whose values must be maps and which merge additively.
const MAP_SETTINGS: [&str; 2] = [OPTIONS, COLLABORATORS];

/// Merge two maps one level deep, `overlay` winning on conflicting keys.
pub fn merge_maps(base: &Map, overlay: &Map) -> Map {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Recursively merge two configuration trees, `overlay` winning on conflicts.
///
/// Objects merge key by key at every depth; any other value in `overlay`
/// replaces the one in `base`.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Normalize an application-wide tree merged with a local one (local wins).
pub fn normalize_layers(
    global: &Value,
    local: &Value,
    factory: &ProviderFactory,
) -> Result<Settings, Error> {
    normalize(&deep_merge(global, local), factory)
}

/// Normalize and validate a raw configuration tree.
///
/// # Errors
///
/// * `MissingProviderConfiguration` - no `providers` map, or an empty one
/// * `InvalidProvider` - a `className` that the factory cannot build
/// * `InvalidSettings` - a non-map `options`, `collaborators` or `mapFields`
pub fn normalize(raw: &Value, factory: &ProviderFactory) -> Result<Settings, Error> {
    let root = raw
        .as_object()
        .ok_or_else(|| config_error(ConfigErrorKind::MissingProviderConfiguration))?;

    let providers = match root.get(PROVIDERS) {
        Some(Value::Object(providers)) if !providers.is_empty() => providers,
        Some(Value::Array(items)) if !items.is_empty() => {
            return Err(config_error(ConfigErrorKind::InvalidSettings(
                PROVIDERS.to_string(),
            )))
        }
        _ => return Err(config_error(ConfigErrorKind::MissingProviderConfiguration)),
    };

    let shared: Map = root
        .iter()
        .filter(|(key, _)| key.as_str() != PROVIDERS)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for key in MAP_SETTINGS {
        if let Some(value) = shared.get(key) {
            ensure_map(key, value)?;
        }
    }

    let mut normalized = BTreeMap::new();
    for (alias, entry) in providers {
        if alias.is_empty() {
            return Err(config_error(ConfigErrorKind::InvalidSettings(
                PROVIDERS.to_string(),
            )));
        }
        let config = normalize_entry(alias, entry, &shared, factory)?;
        debug!("Normalized provider `{}` of kind `{}`", alias, config.kind);
        normalized.insert(alias.clone(), Arc::new(config));
    }

    Ok(Settings::new(normalized, shared))
}

/// Built-in defaults for a provider entry.
fn defaults() -> Map {
    let mut defaults = Map::new();
    defaults.insert(CLASS_NAME.to_string(), Value::Null);
    defaults.insert(OPTIONS.to_string(), Value::Object(Map::new()));
    defaults.insert(COLLABORATORS.to_string(), Value::Object(Map::new()));
    defaults.insert(MAP_FIELDS.to_string(), Value::Object(Map::new()));
    defaults
}

fn normalize_entry(
    alias: &str,
    entry: &Value,
    shared: &Map,
    factory: &ProviderFactory,
) -> Result<ProviderConfig, Error> {
    let entry = entry.as_object().ok_or_else(|| {
        config_error(ConfigErrorKind::InvalidSettings(alias.to_string()))
    })?;

    // Built-in defaults overlaid by shared settings. The resulting key set is
    // the whitelist for the entry.
    let mut merged = merge_maps(&defaults(), shared);

    for (key, value) in entry {
        let Some(current) = merged.get(key) else {
            trace!("Dropping unrecognized setting `{}` of provider `{}`", key, alias);
            continue;
        };

        let next = if MAP_SETTINGS.contains(&key.as_str()) {
            let overlay = ensure_map(key, value)?;
            let base = current.as_object().cloned().unwrap_or_default();
            Value::Object(merge_maps(&base, overlay))
        } else {
            value.clone()
        };
        merged.insert(key.clone(), next);
    }

    let kind = match merged.remove(CLASS_NAME) {
        Some(Value::String(kind)) if factory.contains(&kind) => kind,
        Some(Value::String(kind)) => {
            return Err(config_error(ConfigErrorKind::InvalidProvider(kind)))
        }
        Some(Value::Null) | None => {
            return Err(config_error(ConfigErrorKind::InvalidProvider(String::new())))
        }
        Some(other) => {
            return Err(config_error(ConfigErrorKind::InvalidProvider(
                other.to_string(),
            )))
        }
    };

    let options = take_map(&mut merged, OPTIONS)?;
    let collaborators = take_map(&mut merged, COLLABORATORS)?;
    let map_fields = take_map(&mut merged, MAP_FIELDS)?
        .into_iter()
        .map(|(dst, src)| match src {
            Value::String(src) => Ok((dst, src)),
            _ => Err(config_error(ConfigErrorKind::InvalidSettings(
                MAP_FIELDS.to_string(),
            ))),
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(ProviderConfig {
        alias: alias.to_string(),
        kind,
        options,
        collaborators,
        map_fields,
        extra: merged,
    })
}

fn ensure_map<'a>(key: &str, value: &'a Value) -> Result<&'a Map, Error> {
    value
        .as_object()
        .ok_or_else(|| config_error(ConfigErrorKind::InvalidSettings(key.to_string())))
}

fn take_map(merged: &mut Map, key: &str) -> Result<Map, Error> {
    match merged.remove(key) {
        Some(Value::Object(map)) => Ok(map),
        None => Ok(Map::new()),
        Some(_) => Err(config_error(ConfigErrorKind::InvalidSettings(
            key.to_string(),
        ))),
    }
}
