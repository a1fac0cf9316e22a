//! OAuth provider client trait and the built-in generic implementation.

mod generic;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Map;
use crate::error::Error;
use crate::exchange::GrantRequest;

pub use generic::GenericProvider;

/// Trait for OAuth 2.0 provider clients.
///
/// One instance serves one configured alias. Implementations own their
/// credentials (`clientId`, `clientSecret`, `redirectUri`) and endpoints.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Factory kind this client was built from.
    fn kind(&self) -> &str;

    /// Produce a fresh opaque anti-CSRF state value.
    fn generate_state(&self) -> String {
        crate::state::generate_token()
    }

    /// Build the authorization URL to redirect the user to.
    ///
    /// # Arguments
    ///
    /// * `params` - Extra query parameters, including the issued `state`
    fn authorization_url(&self, params: &Map) -> Result<String, Error>;

    /// Exchange a grant for an access token.
    ///
    /// # Returns
    ///
    /// The token endpoint's answer decoded as plain JSON.
    async fn access_token(&self, grant: &GrantRequest) -> Result<Value, Error>;
}
