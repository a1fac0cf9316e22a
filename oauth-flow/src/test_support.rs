//! In-memory doubles for the host facing traits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use events::{AuthEvent, EventHandler};
use serde_json::Value;
use url::Url;

use crate::config::{scalar_to_string, Map, ProviderConfig};
use crate::error::{exchange_error, Error, ExchangeErrorKind};
use crate::exchange::GrantRequest;
use crate::provider::ProviderClient;
use crate::request::{RequestView, ResponseBuilder, SessionStore};

/// A generic provider config with the given options.
pub fn config(alias: &str, options: Value) -> ProviderConfig {
    ProviderConfig {
        alias: alias.to_string(),
        kind: "generic".to_string(),
        options: options.as_object().cloned().unwrap_or_default(),
        ..ProviderConfig::default()
    }
}

/// Provider answering every grant with a canned response.
pub struct StubProvider {
    answer: Result<Value, ExchangeErrorKind>,
    delay: Option<Duration>,
    grants: Mutex<Vec<GrantRequest>>,
}

impl StubProvider {
    pub fn returning(token: Value) -> Self {
        Self {
            answer: Ok(token),
            delay: None,
            grants: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: ExchangeErrorKind) -> Self {
        Self {
            answer: Err(kind),
            delay: None,
            grants: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Grants received so far.
    pub fn grants(&self) -> Vec<GrantRequest> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn kind(&self) -> &str {
        "stub"
    }

    fn authorization_url(&self, params: &Map) -> Result<String, Error> {
        let mut url = Url::parse("https://provider.test/authorize").unwrap();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(value) = scalar_to_string(value) {
                    query.append_pair(key, &value);
                }
            }
        }
        Ok(url.to_string())
    }

    async fn access_token(&self, grant: &GrantRequest) -> Result<Value, Error> {
        self.grants.lock().unwrap().push(grant.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            Ok(token) => Ok(token.clone()),
            Err(kind) => Err(exchange_error(kind.clone(), "stubbed failure")),
        }
    }
}

/// Session held in a plain map.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn read(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct TestRequest {
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    route: HashMap<String, String>,
    session: MemorySession,
}

impl TestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, key: &str, value: &str) -> Self {
        self.body.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_route(mut self, key: &str, value: &str) -> Self {
        self.route.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_session(self, key: &str, value: &str) -> Self {
        self.session
            .values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn session_value(&self, key: &str) -> Option<String> {
        self.session.values.lock().unwrap().get(key).cloned()
    }
}

impl RequestView for TestRequest {
    fn query(&self, key: &str) -> Option<String> {
        self.query.get(key).cloned()
    }

    fn body_field(&self, key: &str) -> Option<String> {
        self.body.get(key).cloned()
    }

    fn route_param(&self, key: &str) -> Option<String> {
        self.route.get(key).cloned()
    }

    fn session(&self) -> &dyn SessionStore {
        &self.session
    }
}

#[derive(Debug, Default)]
pub struct TestResponse {
    pub location: Option<String>,
}

impl ResponseBuilder for TestResponse {
    fn redirect(&mut self, location: &str) {
        self.location = Some(location.to_string());
    }
}

/// Event handler remembering `(name, payload)` of everything it sees.
#[derive(Default)]
pub struct RecordingHandler {
    answer: Option<Value>,
    seen: Mutex<Vec<(String, Value)>>,
}

impl RecordingHandler {
    pub fn answering(answer: Value) -> Self {
        Self {
            answer: Some(answer),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &AuthEvent) -> Option<Value> {
        let payload = match event {
            AuthEvent::AfterIdentify { result, .. } => result.clone(),
            AuthEvent::NewUser { user, .. } => user.clone(),
        };
        self.seen
            .lock()
            .unwrap()
            .push((event.name().to_string(), payload));
        self.answer.clone()
    }
}
