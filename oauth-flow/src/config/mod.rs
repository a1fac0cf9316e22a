//! Provider configuration: the normalized data model and the validator that
//! produces it from a raw configuration tree.

mod normalize;
mod settings;

pub use normalize::{deep_merge, merge_maps, normalize, normalize_layers};
pub(crate) use settings::scalar_to_string;
pub use settings::{is_truthy, Map, ProviderConfig, Settings, PROTECTED_OPTIONS};
