//! HTTP client builder driven by a provider's `collaborators` settings.

use std::time::Duration;

use serde_json::Value;

use crate::config::Map;
use crate::error::{config_error, ConfigErrorKind, Error};

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    /// Request timeout. Bounds the token exchange round trip.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("oauth-flow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Read `timeout`, `connectTimeout` (seconds) and `userAgent` from a
    /// collaborators map, keeping defaults for anything absent.
    pub fn from_collaborators(collaborators: &Map) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(value) = collaborators.get("timeout") {
            config.timeout = seconds("timeout", value)?;
        }
        if let Some(value) = collaborators.get("connectTimeout") {
            config.connect_timeout = seconds("connectTimeout", value)?;
        }
        if let Some(value) = collaborators.get("userAgent") {
            config.user_agent = value
                .as_str()
                .ok_or_else(|| invalid("userAgent"))?
                .to_string();
        }

        Ok(config)
    }
}

fn seconds(key: &str, value: &Value) -> Result<Duration, Error> {
    value
        .as_f64()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(key))
}

fn invalid(key: &str) -> Error {
    config_error(ConfigErrorKind::InvalidOption(format!("collaborators.{key}")))
}

/// Builder for the HTTP client a provider talks to its endpoints with.
///
/// Requests are never retried: one exchange means one round trip.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent)
            .build()
    }
}
