//! CSRF state management for OAuth flows.
//!
//! The state token lives in the requester's session under [`SESSION_KEY`]. It is
//! written when the redirect to the provider is issued and consumed when the
//! provider sends the user back.

use rand::Rng;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::provider::ProviderClient;
use crate::request::{RequestView, SessionStore};

/// Session key holding the last issued state token.
pub const SESSION_KEY: &str = "oauth2state";

/// Query parameter carrying the state back from the provider.
pub const STATE_PARAM: &str = "state";

/// Issues and verifies session bound state tokens for one provider.
///
/// The check is opt-in per provider through the `state` option. When it is
/// off, nothing is issued and verification always passes.
#[derive(Debug, Clone, Copy)]
pub struct StateGuard {
    enabled: bool,
}

impl StateGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn for_provider(config: &ProviderConfig) -> Self {
        Self::new(config.state_enabled())
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Ask the provider for a fresh state token and store it in the session.
    ///
    /// # Returns
    ///
    /// The issued token, or `None` when the state check is disabled.
    pub async fn issue(
        &self,
        provider: &dyn ProviderClient,
        session: &dyn SessionStore,
    ) -> Result<Option<String>, Error> {
        if !self.enabled {
            return Ok(None);
        }

        let state = provider.generate_state();
        session.write(SESSION_KEY, &state).await?;
        debug!("Issued OAuth state token");

        Ok(Some(state))
    }

    /// Compare the state returned by the provider with the one in the session.
    ///
    /// The stored token is removed whatever the outcome, so each token is
    /// accepted at most once.
    pub async fn verify(&self, request: &dyn RequestView) -> Result<bool, Error> {
        if !self.enabled {
            return Ok(true);
        }

        let session = request.session();
        let stored = session.read(SESSION_KEY).await?;
        session.delete(SESSION_KEY).await?;

        let supplied = request.query(STATE_PARAM).filter(|state| !state.is_empty());

        let valid = match (supplied, stored) {
            (Some(supplied), Some(stored)) => supplied == stored,
            _ => false,
        };

        if !valid {
            warn!("OAuth state mismatch, rejecting callback");
        }

        Ok(valid)
    }
}

/// Generate a cryptographically random state token.
pub fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}
