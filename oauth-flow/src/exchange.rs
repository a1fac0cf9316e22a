//! Grant construction and token exchange.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Map, ProviderConfig};
use crate::error::{exchange_error, Error, ExchangeErrorKind};
use crate::provider::ProviderClient;
use crate::request::RequestView;

/// OAuth 2.0 grants this crate knows how to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    #[default]
    AuthorizationCode,
    ClientCredentials,
}

impl GrantType {
    /// Get the grant identifier sent to token endpoints.
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
        }
    }

    /// Interpret the `grant` option. Anything unknown falls back to the
    /// authorization code grant.
    pub fn from_option(value: &str) -> Self {
        match value {
            "client_credentials" => GrantType::ClientCredentials,
            _ => GrantType::AuthorizationCode,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One token exchange attempt. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantRequest {
    grant_type: GrantType,
    parameters: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl GrantRequest {
    pub fn new(
        grant_type: GrantType,
        parameters: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            grant_type,
            parameters,
            headers,
        }
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Raw decoded token payload, forwarded to the caller untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenResult(Map);

impl TokenResult {
    /// Accept a provider answer as a token result.
    ///
    /// Only a non-empty JSON object counts as a token; anything else means no
    /// token was obtained.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) if !map.is_empty() => Ok(Self(map)),
            Value::Object(_) => Err(exchange_error(
                ExchangeErrorKind::Decode,
                "Provider returned an empty token object",
            )),
            other => Err(exchange_error(
                ExchangeErrorKind::Decode,
                &format!("Provider returned a non-object token: {}", type_name(&other)),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds grant requests from inbound requests and runs them against a provider.
pub struct GrantExchanger;

impl GrantExchanger {
    /// Header attached to every exchange.
    pub const ACCEPT: (&'static str, &'static str) = ("Accept", "application/json");

    /// Translate the inbound request into a grant request for the configured grant.
    ///
    /// | grant                | source                          | parameters                  |
    /// |----------------------|---------------------------------|-----------------------------|
    /// | `client_credentials` | body `username` present         | username, password, format  |
    /// | `client_credentials` | otherwise, routing parameters   | username, password          |
    /// | `authorization_code` | query `code`                    | code                        |
    ///
    /// Only a missing `code` is an error; a client credentials grant without
    /// a username still goes to the token endpoint.
    pub fn build_request(
        config: &ProviderConfig,
        request: &dyn RequestView,
    ) -> Result<GrantRequest, Error> {
        let grant_type = config.grant();
        let mut parameters = BTreeMap::new();

        match grant_type {
            GrantType::ClientCredentials => {
                if let Some(username) = non_empty(request.body_field("username")) {
                    parameters.insert("username".to_string(), username);
                    parameters.insert(
                        "password".to_string(),
                        request.body_field("password").unwrap_or_default(),
                    );
                    parameters.insert("format".to_string(), "json".to_string());
                } else {
                    // Routing parameters are forwarded as far as they exist.
                    for key in ["username", "password"] {
                        if let Some(value) = request.route_param(key) {
                            parameters.insert(key.to_string(), value);
                        }
                    }
                }
            }
            GrantType::AuthorizationCode => {
                let code = non_empty(request.query("code")).ok_or_else(|| {
                    exchange_error(
                        ExchangeErrorKind::MissingParameter("code".to_string()),
                        "No authorization code in query",
                    )
                })?;
                parameters.insert("code".to_string(), code);
            }
        }

        let mut headers = BTreeMap::new();
        headers.insert(Self::ACCEPT.0.to_string(), Self::ACCEPT.1.to_string());

        Ok(GrantRequest::new(grant_type, parameters, headers))
    }

    /// Run a single exchange against the provider's token endpoint.
    ///
    /// Every failure is logged here. Callers only decide whether the request
    /// counts as authenticated.
    pub async fn exchange(
        provider: &dyn ProviderClient,
        config: &ProviderConfig,
        request: &dyn RequestView,
    ) -> Result<TokenResult, Error> {
        let grant = Self::build_request(config, request).map_err(|e| {
            debug!("No grant evidence for provider `{}`: {}", config.alias, e);
            e
        })?;

        debug!(
            "Exchanging {} grant with provider `{}`",
            grant.grant_type(),
            config.alias
        );

        let result = provider
            .access_token(&grant)
            .await
            .and_then(TokenResult::from_value);

        match &result {
            Ok(_) => info!("Obtained access token from provider `{}`", config.alias),
            Err(e) if e.is_rejection() => {
                warn!("Provider `{}` rejected the grant: {:?}", config.alias, e)
            }
            Err(e) => warn!(
                "Token exchange with provider `{}` failed: {:?}",
                config.alias, e
            ),
        }

        result
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
