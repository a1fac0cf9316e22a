//! Lifecycle event infrastructure for the OAuth gateway.
//!
//! This crate lets the authentication core notify the host application
//! without depending on it.
//!
//! # Architecture
//!
//! - **AuthEvent**: Enum representing the authentication lifecycle events
//! - **EventHandler**: Trait for implementing event listeners
//! - **EventPublisher**: Dispatches events to registered listeners
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Provider payloads are carried as serialized JSON values.

use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Name of the event emitted after a provider identified the requester.
pub const AFTER_IDENTIFY: &str = "Muffin/OAuth2.afterIdentify";

/// Name of the event asking listeners to create a local user.
pub const NEW_USER: &str = "Muffin/OAuth2.newUser";

/// Authentication lifecycle events.
///
/// Provider data is carried as `serde_json::Value` so listeners don't need the
/// authentication crate's types.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// Emitted when a grant exchange succeeded.
    /// Listeners receive the raw token payload exactly as returned to the caller.
    AfterIdentify {
        /// Configuration alias of the provider that identified the user.
        provider_alias: String,
        /// Factory kind of that provider (e.g. `generic`).
        provider_kind: String,
        /// Raw decoded token payload.
        result: Value,
    },
    /// Emitted when the host wants a local user created from provider data.
    /// A listener is expected to answer with the stored user record.
    NewUser {
        provider_alias: String,
        provider_kind: String,
        user: Value,
    },
}

impl AuthEvent {
    /// The stable event name listeners can match on.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::AfterIdentify { .. } => AFTER_IDENTIFY,
            AuthEvent::NewUser { .. } => NEW_USER,
        }
    }
}

/// How strictly a dispatch that expects an answer treats silence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerPolicy {
    /// Missing answer is a configuration error.
    #[default]
    Strict,
    /// Missing answer is reported as `None`.
    Lenient,
}

/// No listener produced a result for an event that requires one.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingListener {
    pub event_name: &'static str,
}

impl fmt::Display for MissingListener {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "no listener answered event `{}`", self.event_name)
    }
}

impl StdError for MissingListener {}

/// Trait for handling authentication events.
/// Returning `Some` answers the event; the last answer wins.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &AuthEvent) -> Option<Value>;
}

/// Publishes authentication events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers, ignoring their answers.
    pub async fn publish(&self, event: AuthEvent) {
        self.dispatch(&event).await;
    }

    /// Dispatch an event and return the last answer given by a handler.
    pub async fn dispatch(&self, event: &AuthEvent) -> Option<Value> {
        let mut result = None;
        for handler in self.handlers.iter() {
            if let Some(answer) = handler.handle(event).await {
                result = Some(answer);
            }
        }
        trace!(
            "Dispatched {} to {} handler(s), answered: {}",
            event.name(),
            self.handlers.len(),
            result.is_some()
        );
        result
    }

    /// Dispatch an event that is expected to be answered.
    ///
    /// Under [`ListenerPolicy::Strict`] silence is an error; under
    /// [`ListenerPolicy::Lenient`] it is `Ok(None)`.
    pub async fn dispatch_required(
        &self,
        event: &AuthEvent,
        policy: ListenerPolicy,
    ) -> Result<Option<Value>, MissingListener> {
        match (self.dispatch(event).await, policy) {
            (Some(answer), _) => Ok(Some(answer)),
            (None, ListenerPolicy::Lenient) => Ok(None),
            (None, ListenerPolicy::Strict) => {
                warn!("Event {} requires a listener but none answered", event.name());
                Err(MissingListener {
                    event_name: event.name(),
                })
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
