//! Field mapping from raw provider payloads to a host's user schema.
//!
//! Each `mapFields` entry maps a destination field to a dotted source path:
//! `{"username": "user.login"}` moves `user.login` to `username`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::Map;

/// Apply `map_fields` to `data`, returning the remapped payload.
///
/// Source paths that don't exist map to `null`. Mapped source fields are
/// removed from the result.
pub fn map_fields(data: &Map, map_fields: &BTreeMap<String, String>) -> Map {
    let mut mapped = data.clone();
    for (dst, src) in map_fields {
        let value = get_path(&mapped, src).cloned().unwrap_or(Value::Null);
        remove_path(&mut mapped, src);
        mapped.insert(dst.clone(), value);
    }
    mapped
}

/// Look up a dotted path such as `user.emails.0`.
pub fn get_path<'a>(data: &'a Map, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = data.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Remove the value at a dotted path, if any.
pub fn remove_path(data: &mut Map, path: &str) {
    match path.rsplit_once('.') {
        None => {
            data.remove(path);
        }
        Some((parent, last)) => {
            let mut segments = parent.split('.');
            let Some(first) = segments.next() else {
                return;
            };
            let Some(mut current) = data.get_mut(first) else {
                return;
            };
            for segment in segments {
                current = match current {
                    Value::Object(map) => match map.get_mut(segment) {
                        Some(next) => next,
                        None => return,
                    },
                    _ => return,
                };
            }
            if let Value::Object(map) = current {
                map.remove(last);
            }
        }
    }
}
