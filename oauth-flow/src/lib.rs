//! # oauth-flow
//!
//! Authenticate requests through third-party OAuth 2.0 providers:
//! - Provider configuration normalization and validation
//! - Alias based provider resolution through a typed factory
//! - Session bound anti-CSRF state tokens
//! - Authorization code and client credentials grant exchanges
//! - The request level flow tying the pieces together
//!
//! ## Architecture
//!
//! The crate owns no web framework, session backend or user model. Hosts plug
//! those in through the traits in [`request`] and listen to lifecycle events
//! through the `events` crate:
//! - `web` adapts axum requests and `tower-sessions` sessions
//! - the root binary wires configuration, logging and the registry together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oauth_flow::{
//!     config::normalize,
//!     flow::AuthenticationFlow,
//!     registry::{ProviderFactory, ProviderRegistry},
//! };
//!
//! let factory = ProviderFactory::with_defaults();
//! let settings = normalize(&raw_config, &factory)?;
//! let registry = Arc::new(ProviderRegistry::new(settings, factory));
//! let flow = AuthenticationFlow::new(registry, publisher);
//! ```

pub mod config;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod http;
pub mod mapping;
pub mod provider;
pub mod registry;
pub mod request;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
