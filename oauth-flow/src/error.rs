//! Error types for the `oauth-flow` crate.
//!
//! Follows the layered pattern used across the workspace: a root Error struct
//! holding an error kind tree and an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for oauth-flow crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in oauth-flow.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    Config(ConfigErrorKind),
    Exchange(ExchangeErrorKind),
    Session,
    Event(EventErrorKind),
    Http(HttpErrorKind),
}

/// Errors raised while normalizing provider configuration.
/// These are fatal at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorKind {
    /// The `providers` section is missing or empty.
    MissingProviderConfiguration,
    /// `className` does not name a registered provider kind.
    InvalidProvider(String),
    /// A settings key that must be a map holds something else.
    InvalidSettings(String),
    /// A provider constructor rejected its options.
    InvalidOption(String),
}

/// Errors from a token exchange attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeErrorKind {
    /// The request carried no grant evidence for this parameter.
    MissingParameter(String),
    /// The provider answered with a non-success status.
    Rejected { status: u16 },
    /// The token endpoint could not be reached.
    Transport,
    /// The exchange did not finish within the configured timeout.
    Timeout,
    /// The provider answer was not a usable token object.
    Decode,
}

/// Errors from lifecycle event dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum EventErrorKind {
    /// An event that must produce a result had no answering listener.
    MissingEventListener(String),
}

/// Errors from HTTP client operations.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
}

impl Error {
    /// True for errors where the provider actively refused the grant,
    /// as opposed to transport trouble.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Exchange(ExchangeErrorKind::Rejected { .. })
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Config(kind) => write!(f, "Configuration error: {:?}", kind),
            ErrorKind::Exchange(kind) => write!(f, "Token exchange error: {:?}", kind),
            ErrorKind::Session => write!(f, "Session error"),
            ErrorKind::Event(kind) => write!(f, "Event error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_timeout() {
            ErrorKind::Exchange(ExchangeErrorKind::Timeout)
        } else if err.is_decode() {
            ErrorKind::Exchange(ExchangeErrorKind::Decode)
        } else if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Exchange(ExchangeErrorKind::Transport)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<events::MissingListener> for Error {
    fn from(err: events::MissingListener) -> Self {
        Error {
            error_kind: ErrorKind::Event(EventErrorKind::MissingEventListener(
                err.event_name.to_string(),
            )),
            source: Some(Box::new(err)),
        }
    }
}

/// Helper function to create configuration errors.
pub fn config_error(kind: ConfigErrorKind) -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create token exchange errors.
pub fn exchange_error(kind: ExchangeErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Exchange(kind),
    }
}

/// Helper function to wrap a session backend failure.
pub fn session_error<E>(err: E) -> Error
where
    E: StdError + Send + Sync + 'static,
{
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Session,
    }
}
