//! Request level OAuth authentication flow.
//!
//! An [`AuthenticationFlow`] is built for one inbound request. It resolves the
//! requested provider once, then either completes a provider callback
//! ([`AuthenticationFlow::authenticate`]) or sends the user off to the provider
//! ([`AuthenticationFlow::unauthenticated`]).

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use events::{AuthEvent, EventPublisher, ListenerPolicy};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Map;
use crate::error::{exchange_error, Error, ExchangeErrorKind};
use crate::exchange::{GrantExchanger, TokenResult};
use crate::mapping;
use crate::registry::{ProviderRegistry, ResolvedProvider};
use crate::request::{RequestView, ResponseBuilder};
use crate::state::{StateGuard, STATE_PARAM};

/// Request field naming the provider alias.
pub const PROVIDER_PARAM: &str = "provider";

/// Knobs shared by every flow of a host.
#[derive(Debug, Clone, Default)]
pub struct FlowOptions {
    /// Upper bound for the token exchange round trip.
    pub exchange_timeout: Option<Duration>,
    /// How `newUser` dispatch treats a missing answer.
    pub listener_policy: ListenerPolicy,
}

/// Why a callback did not authenticate.
#[derive(Debug)]
pub enum Rejection {
    /// The returned state did not match the session.
    StateMismatch,
    /// The session backend failed while checking state.
    Session(Error),
    /// No token came out of the exchange.
    Exchange(Error),
}

/// Result of processing a request through the flow.
#[derive(Debug)]
pub enum Outcome {
    /// The request names no provider this host knows.
    NoProvider,
    /// A provider was found but the request is not authenticated.
    Rejected(Rejection),
    /// The exchange produced a token.
    Authenticated(TokenResult),
}

/// OAuth authentication for one request.
pub struct AuthenticationFlow {
    registry: Arc<ProviderRegistry>,
    events: EventPublisher,
    options: FlowOptions,
    provider: OnceLock<ResolvedProvider>,
}

impl AuthenticationFlow {
    pub fn new(registry: Arc<ProviderRegistry>, events: EventPublisher) -> Self {
        Self {
            registry,
            events,
            options: FlowOptions::default(),
            provider: OnceLock::new(),
        }
    }

    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    /// The provider requested by `request`.
    ///
    /// The alias comes from the body field `provider`, else the routing
    /// parameter, else the query string. A successful resolution is kept for
    /// the rest of this flow.
    pub fn provider(&self, request: &dyn RequestView) -> Option<ResolvedProvider> {
        if let Some(provider) = self.provider.get() {
            return Some(provider.clone());
        }

        let alias = requested_alias(request)?;
        let resolved = self.registry.resolve(&alias)?;
        Some(self.provider.get_or_init(|| resolved).clone())
    }

    /// Validate the callback and exchange its grant.
    pub async fn identify(&self, request: &dyn RequestView) -> Outcome {
        let Some(provider) = self.provider(request) else {
            return Outcome::NoProvider;
        };

        match StateGuard::for_provider(provider.config())
            .verify(request)
            .await
        {
            Ok(true) => {}
            Ok(false) => return Outcome::Rejected(Rejection::StateMismatch),
            Err(e) => {
                error!("Session failure while checking OAuth state: {:?}", e);
                return Outcome::Rejected(Rejection::Session(e));
            }
        }

        let exchange = GrantExchanger::exchange(provider.client(), provider.config(), request);
        let result = match self.options.exchange_timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Token exchange with provider `{}` timed out after {:?}",
                        provider.alias(),
                        limit
                    );
                    Err(exchange_error(
                        ExchangeErrorKind::Timeout,
                        "Token exchange timed out",
                    ))
                }
            },
            None => exchange.await,
        };

        match result {
            Ok(token) => Outcome::Authenticated(token),
            Err(e) => Outcome::Rejected(Rejection::Exchange(e)),
        }
    }

    /// Authenticate a provider callback.
    ///
    /// On success the raw token payload is published as `afterIdentify` and
    /// returned unchanged. Every failure is `None` so the host can fall
    /// through to its other authentication methods.
    pub async fn authenticate(&self, request: &dyn RequestView) -> Option<TokenResult> {
        match self.identify(request).await {
            Outcome::Authenticated(result) => {
                if let Some(provider) = self.provider.get() {
                    info!("Authenticated request through provider `{}`", provider.alias());
                    self.events
                        .publish(AuthEvent::AfterIdentify {
                            provider_alias: provider.alias().to_string(),
                            provider_kind: provider.client().kind().to_string(),
                            result: result.clone().into_value(),
                        })
                        .await;
                }
                Some(result)
            }
            Outcome::NoProvider => None,
            Outcome::Rejected(reason) => {
                debug!("OAuth authentication rejected: {:?}", reason);
                None
            }
        }
    }

    /// Send an unauthenticated user to the provider's authorization page.
    ///
    /// Nothing happens when no provider is requested or when the request
    /// already is a provider callback (it carries a `code`).
    ///
    /// # Returns
    ///
    /// The authorization URL the response now redirects to, if any.
    pub async fn unauthenticated(
        &self,
        request: &dyn RequestView,
        response: &mut dyn ResponseBuilder,
    ) -> Result<Option<String>, Error> {
        let Some(provider) = self.provider(request) else {
            return Ok(None);
        };
        if request.query("code").is_some_and(|code| !code.is_empty()) {
            return Ok(None);
        }

        let state = StateGuard::for_provider(provider.config())
            .issue(provider.client(), request.session())
            .await?;

        let mut params = provider.config().query_params();
        params.remove(STATE_PARAM);
        if let Some(state) = state {
            params.insert(STATE_PARAM.to_string(), Value::String(state));
        }

        let url = provider.client().authorization_url(&params)?;
        debug!("Redirecting to provider `{}` for authorization", provider.alias());
        response.redirect(&url);

        Ok(Some(url))
    }

    /// Remap a token payload with the resolved provider's `mapFields`.
    ///
    /// Returns `None` when no provider has been resolved by this flow.
    pub fn map_fields(&self, result: &TokenResult) -> Option<Map> {
        let provider = self.provider.get()?;
        Some(mapping::map_fields(
            result.as_map(),
            &provider.config().map_fields,
        ))
    }

    /// Ask listeners to create a local user from provider data.
    ///
    /// # Errors
    ///
    /// `MissingEventListener` when no listener answered and the listener
    /// policy is strict.
    pub async fn announce_new_user(
        &self,
        request: &dyn RequestView,
        user: Value,
    ) -> Result<Option<Value>, Error> {
        let Some(provider) = self.provider(request) else {
            return Ok(None);
        };

        let event = AuthEvent::NewUser {
            provider_alias: provider.alias().to_string(),
            provider_kind: provider.client().kind().to_string(),
            user,
        };

        Ok(self
            .events
            .dispatch_required(&event, self.options.listener_policy)
            .await?)
    }
}

fn requested_alias(request: &dyn RequestView) -> Option<String> {
    [
        request.body_field(PROVIDER_PARAM),
        request.route_param(PROVIDER_PARAM),
        request.query(PROVIDER_PARAM),
    ]
    .into_iter()
    .flatten()
    .find(|alias| !alias.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::normalize;
    use crate::error::{ErrorKind, EventErrorKind};
    use crate::registry::ProviderFactory;
    use crate::state::SESSION_KEY;
    use crate::test_support::{RecordingHandler, StubProvider, TestRequest, TestResponse};
    use serde_json::json;
    use std::collections::BTreeMap;
    use url::Url;

    const TOKEN: &str = r#"{"access_token":"gho_abc","token_type":"bearer","user":{"login":"octocat"}}"#;

    struct Fixture {
        github: Arc<StubProvider>,
        registry: Arc<ProviderRegistry>,
        recorder: Arc<RecordingHandler>,
        events: EventPublisher,
    }

    fn fixture_with(state: bool, grant: &str, github: StubProvider) -> Fixture {
        let github = Arc::new(github);
        let stub = Arc::clone(&github);
        let factory = ProviderFactory::new().with_kind("stub", move |_| {
            Ok(Arc::clone(&stub) as Arc<dyn crate::provider::ProviderClient>)
        });
        let raw = json!({
            "options": {"state": state},
            "providers": {
                "github": {
                    "className": "stub",
                    "options": {
                        "clientId": "client-123",
                        "clientSecret": "secret-456",
                        "redirectUri": "https://app.test/oauth/github",
                        "grant": grant,
                        "scope": "read:user"
                    },
                    "mapFields": {"username": "user.login"}
                }
            }
        });
        let settings = normalize(&raw, &factory).unwrap();
        let registry = Arc::new(ProviderRegistry::new(settings, factory));
        let recorder = Arc::new(RecordingHandler::default());
        let events = EventPublisher::new().with_handler(recorder.clone());

        Fixture {
            github,
            registry,
            recorder,
            events,
        }
    }

    fn fixture(state: bool) -> Fixture {
        fixture_with(
            state,
            "authorization_code",
            StubProvider::returning(serde_json::from_str(TOKEN).unwrap()),
        )
    }

    impl Fixture {
        fn flow(&self) -> AuthenticationFlow {
            AuthenticationFlow::new(Arc::clone(&self.registry), self.events.clone())
        }
    }

    #[test]
    fn test_alias_precedence() {
        let request = TestRequest::new()
            .with_query("provider", "query")
            .with_route("provider", "route")
            .with_body("provider", "body");
        assert_eq!(requested_alias(&request).as_deref(), Some("body"));

        let request = TestRequest::new()
            .with_query("provider", "query")
            .with_route("provider", "route")
            .with_body("provider", "");
        assert_eq!(requested_alias(&request).as_deref(), Some("route"));

        let request = TestRequest::new().with_query("provider", "query");
        assert_eq!(requested_alias(&request).as_deref(), Some("query"));

        assert_eq!(requested_alias(&TestRequest::new()), None);
    }

    #[test]
    fn test_provider_resolution_is_cached_for_the_flow() {
        let fixture = fixture(true);
        let flow = fixture.flow();

        let first = flow
            .provider(&TestRequest::new().with_query("provider", "github"))
            .unwrap();
        let second = flow.provider(&TestRequest::new()).unwrap();
        assert_eq!(first.alias(), second.alias());
    }

    // Scenario: fresh login redirects to the provider with a session bound state.
    #[tokio::test]
    async fn test_unauthenticated_redirects_to_provider() {
        let fixture = fixture(true);
        let flow = fixture.flow();
        let request = TestRequest::new().with_query("provider", "github");
        let mut response = TestResponse::default();

        let url = flow
            .unauthenticated(&request, &mut response)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(response.location.as_deref(), Some(url.as_str()));
        let stored = request.session_value(SESSION_KEY).unwrap();

        let params: BTreeMap<String, String> = Url::parse(&url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();
        assert_eq!(params.get("state"), Some(&stored));
        assert_eq!(params.get("scope").map(String::as_str), Some("read:user"));
        assert_eq!(
            params.get("grant").map(String::as_str),
            Some("authorization_code")
        );
        assert!(!params.contains_key("clientId"));
        assert!(!params.contains_key("clientSecret"));
        assert!(!params.contains_key("redirectUri"));
    }

    #[tokio::test]
    async fn test_unauthenticated_without_state_check_drops_switch() {
        let fixture = fixture(false);
        let flow = fixture.flow();
        let request = TestRequest::new().with_query("provider", "github");
        let mut response = TestResponse::default();

        let url = flow
            .unauthenticated(&request, &mut response)
            .await
            .unwrap()
            .unwrap();

        assert!(!url.contains("state="));
        assert_eq!(request.session_value(SESSION_KEY), None);
    }

    #[tokio::test]
    async fn test_unauthenticated_ignores_provider_callback() {
        let fixture = fixture(true);
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc");
        let mut response = TestResponse::default();

        let url = flow.unauthenticated(&request, &mut response).await.unwrap();

        assert_eq!(url, None);
        assert_eq!(response.location, None);
        assert_eq!(request.session_value(SESSION_KEY), None);
    }

    // Scenario: callback with matching state exchanges the code.
    #[tokio::test]
    async fn test_callback_with_valid_state_authenticates() {
        let fixture = fixture(true);
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc")
            .with_query("state", "S")
            .with_session(SESSION_KEY, "S");

        let result = flow.authenticate(&request).await.unwrap();
        assert_eq!(result.access_token(), Some("gho_abc"));

        let grants = fixture.github.grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].grant_type().as_str(), "authorization_code");
        assert_eq!(
            grants[0].parameters(),
            &BTreeMap::from([("code".to_string(), "abc".to_string())])
        );
        assert_eq!(
            grants[0].headers(),
            &BTreeMap::from([("Accept".to_string(), "application/json".to_string())])
        );

        let seen = fixture.recorder.events();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, events::AFTER_IDENTIFY);
        assert_eq!(seen[0].1, serde_json::from_str::<Value>(TOKEN).unwrap());
    }

    // Scenario: a forged state never reaches the token endpoint.
    #[tokio::test]
    async fn test_callback_with_mismatched_state_fails_without_exchange() {
        let fixture = fixture(true);
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc")
            .with_query("state", "forged")
            .with_session(SESSION_KEY, "S");

        assert!(flow.authenticate(&request).await.is_none());
        assert!(fixture.github.grants().is_empty());
        assert!(fixture.recorder.events().is_empty());
        assert_eq!(request.session_value(SESSION_KEY), None);
    }

    // Scenario: unknown providers are not this flow's concern.
    #[tokio::test]
    async fn test_unknown_provider_is_ignored() {
        let fixture = fixture(true);
        let flow = fixture.flow();
        let request = TestRequest::new().with_query("provider", "unknown");
        let mut response = TestResponse::default();

        assert!(flow.provider(&request).is_none());
        assert!(matches!(flow.identify(&request).await, Outcome::NoProvider));
        assert!(flow.authenticate(&request).await.is_none());
        assert_eq!(
            flow.unauthenticated(&request, &mut response).await.unwrap(),
            None
        );
        assert_eq!(response.location, None);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_not_authenticated() {
        let fixture = fixture_with(
            false,
            "authorization_code",
            StubProvider::failing(ExchangeErrorKind::Transport),
        );
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc");

        match flow.identify(&request).await {
            Outcome::Rejected(Rejection::Exchange(e)) => {
                assert_eq!(e.error_kind, ErrorKind::Exchange(ExchangeErrorKind::Transport))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(flow.authenticate(&request).await.is_none());
        assert!(fixture.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_token_is_not_authenticated() {
        let fixture = fixture_with(false, "authorization_code", StubProvider::returning(json!({})));
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc");

        assert!(flow.authenticate(&request).await.is_none());
        assert_eq!(fixture.github.grants().len(), 1);
    }

    #[tokio::test]
    async fn test_exchange_timeout_reports_failure() {
        let fixture = fixture_with(
            false,
            "authorization_code",
            StubProvider::returning(json!({"access_token": "late"}))
                .with_delay(Duration::from_millis(200)),
        );
        let flow = fixture.flow().with_options(FlowOptions {
            exchange_timeout: Some(Duration::from_millis(10)),
            ..FlowOptions::default()
        });
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc");

        match flow.identify(&request).await {
            Outcome::Rejected(Rejection::Exchange(e)) => {
                assert_eq!(e.error_kind, ErrorKind::Exchange(ExchangeErrorKind::Timeout))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_credentials_from_json_body() {
        let fixture = fixture_with(
            false,
            "client_credentials",
            StubProvider::returning(json!({"access_token": "cc"})),
        );
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_body("provider", "github")
            .with_body("username", "alice")
            .with_body("password", "s3cret");

        let result = flow.authenticate(&request).await.unwrap();
        assert_eq!(result.access_token(), Some("cc"));

        let grants = fixture.github.grants();
        assert_eq!(grants[0].grant_type().as_str(), "client_credentials");
        assert_eq!(
            grants[0].parameters().get("format").map(String::as_str),
            Some("json")
        );
    }

    #[tokio::test]
    async fn test_client_credentials_without_username_reaches_provider() {
        let fixture = fixture_with(
            false,
            "client_credentials",
            StubProvider::returning(json!({"access_token": "service"})),
        );
        let flow = fixture.flow();
        let request = TestRequest::new().with_query("provider", "github");

        let result = flow.authenticate(&request).await.unwrap();
        assert_eq!(result.access_token(), Some("service"));

        let grants = fixture.github.grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].grant_type().as_str(), "client_credentials");
        assert!(grants[0].parameters().is_empty());
    }

    #[tokio::test]
    async fn test_map_fields_uses_provider_mapping() {
        let fixture = fixture(false);
        let flow = fixture.flow();
        let request = TestRequest::new()
            .with_query("provider", "github")
            .with_query("code", "abc");

        let result = flow.authenticate(&request).await.unwrap();
        let mapped = flow.map_fields(&result).unwrap();
        assert_eq!(mapped.get("username"), Some(&json!("octocat")));
    }

    #[tokio::test]
    async fn test_new_user_without_listener_is_an_error_when_strict() {
        let fixture = fixture(false);
        let flow = AuthenticationFlow::new(Arc::clone(&fixture.registry), EventPublisher::new());
        let request = TestRequest::new().with_query("provider", "github");

        let err = flow
            .announce_new_user(&request, json!({"username": "octocat"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Event(EventErrorKind::MissingEventListener(
                events::NEW_USER.to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_new_user_without_listener_is_none_when_lenient() {
        let fixture = fixture(false);
        let flow = AuthenticationFlow::new(Arc::clone(&fixture.registry), EventPublisher::new())
            .with_options(FlowOptions {
                listener_policy: ListenerPolicy::Lenient,
                ..FlowOptions::default()
            });
        let request = TestRequest::new().with_query("provider", "github");

        let answer = flow
            .announce_new_user(&request, json!({"username": "octocat"}))
            .await
            .unwrap();
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn test_new_user_answered_by_listener() {
        let fixture = fixture(false);
        let answering = Arc::new(RecordingHandler::answering(json!({"id": 7})));
        let flow = AuthenticationFlow::new(
            Arc::clone(&fixture.registry),
            EventPublisher::new().with_handler(answering.clone()),
        );
        let request = TestRequest::new().with_query("provider", "github");

        let answer = flow
            .announce_new_user(&request, json!({"username": "octocat"}))
            .await
            .unwrap();
        assert_eq!(answer, Some(json!({"id": 7})));
        assert_eq!(answering.events()[0].0, events::NEW_USER);
    }
}
