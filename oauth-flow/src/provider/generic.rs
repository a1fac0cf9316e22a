//! Generic OAuth 2.0 provider driven entirely by configuration.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::ProviderClient;
use crate::config::{scalar_to_string, Map, ProviderConfig};
use crate::error::{config_error, exchange_error, ConfigErrorKind, Error, ExchangeErrorKind};
use crate::exchange::{GrantRequest, GrantType};
use crate::http::{HttpClientBuilder, HttpClientConfig};

/// Options consumed by the provider itself and never forwarded as extra
/// authorization URL parameters.
const OWN_OPTIONS: [&str; 9] = [
    "clientId",
    "clientSecret",
    "redirectUri",
    "urlAuthorize",
    "urlAccessToken",
    "urlResourceOwnerDetails",
    "scopes",
    "scopeSeparator",
    "grant",
];

/// Query parameters the provider sets itself.
const RESERVED_PARAMS: [&str; 4] = ["response_type", "client_id", "redirect_uri", "scope"];

/// Generic OAuth provider.
///
/// Reads its endpoints and credentials from the provider options:
/// - `clientId`, `clientSecret`, `redirectUri`
/// - `urlAuthorize`, `urlAccessToken`
/// - `scopes` (string or list) joined with `scopeSeparator` (default a space)
pub struct GenericProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
    authorize_url: Url,
    token_url: Url,
    scope: Option<String>,
    http_client: reqwest::Client,
}

impl GenericProvider {
    /// Factory kind of this provider.
    pub const KIND: &'static str = "generic";

    /// Create a new generic provider from a normalized configuration.
    ///
    /// # Errors
    ///
    /// `InvalidOption` when a required option is missing or an endpoint is not a URL.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        let client_id = config
            .option_str("clientId")
            .ok_or_else(|| invalid_option("clientId"))?;
        let authorize_url = endpoint(config, "urlAuthorize")?;
        let token_url = endpoint(config, "urlAccessToken")?;

        let separator = config
            .option_str("scopeSeparator")
            .unwrap_or_else(|| " ".to_string());
        let scope = match config.options.get("scopes") {
            Some(Value::String(scopes)) if !scopes.is_empty() => Some(scopes.clone()),
            Some(Value::Array(scopes)) if !scopes.is_empty() => Some(
                scopes
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(separator.as_str()),
            ),
            Some(Value::String(_)) | Some(Value::Array(_)) | None => None,
            Some(_) => return Err(invalid_option("scopes")),
        };

        let http_config = HttpClientConfig::from_collaborators(&config.collaborators)?;
        let http_client = HttpClientBuilder::with_config(http_config).build()?;

        Ok(Self {
            client_id,
            client_secret: config.option_str("clientSecret").unwrap_or_default(),
            redirect_uri: config.option_str("redirectUri"),
            authorize_url,
            token_url,
            scope,
            http_client,
        })
    }
}

fn endpoint(config: &ProviderConfig, key: &str) -> Result<Url, Error> {
    let raw = config.option_str(key).ok_or_else(|| invalid_option(key))?;
    Url::parse(&raw).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: crate::ErrorKind::Config(ConfigErrorKind::InvalidOption(key.to_string())),
    })
}

fn invalid_option(key: &str) -> Error {
    config_error(ConfigErrorKind::InvalidOption(key.to_string()))
}

#[async_trait]
impl ProviderClient for GenericProvider {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn authorization_url(&self, params: &Map) -> Result<String, Error> {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            if let Some(redirect_uri) = &self.redirect_uri {
                query.append_pair("redirect_uri", redirect_uri);
            }
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
            for (key, value) in params {
                if RESERVED_PARAMS.contains(&key.as_str()) || OWN_OPTIONS.contains(&key.as_str()) {
                    continue;
                }
                if let Some(value) = scalar_to_string(value) {
                    query.append_pair(key, &value);
                }
            }
        }

        Ok(url.into())
    }

    async fn access_token(&self, grant: &GrantRequest) -> Result<Value, Error> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", grant.grant_type().as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if grant.grant_type() == GrantType::AuthorizationCode {
            if let Some(redirect_uri) = &self.redirect_uri {
                form.push(("redirect_uri", redirect_uri.as_str()));
            }
        }
        for (key, value) in grant.parameters() {
            form.push((key.as_str(), value.as_str()));
        }

        let mut request = self.http_client.post(self.token_url.clone()).form(&form);
        for (name, value) in grant.headers() {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!("Requesting access token from {}", self.token_url);

        let response = request.send().await.map_err(|e| {
            warn!("Failed to reach token endpoint {}: {:?}", self.token_url, e);
            Error::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            let token: Value = response.json().await?;
            Ok(token)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Token endpoint answered {}: {}", status, error_text);
            Err(exchange_error(
                ExchangeErrorKind::Rejected {
                    status: status.as_u16(),
                },
                &error_text,
            ))
        }
    }
}
