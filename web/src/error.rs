use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use oauth_flow::error::{
    ConfigErrorKind, Error as FlowError, ErrorKind, ExchangeErrorKind, HttpErrorKind,
};

extern crate log;
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(FlowError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        status_for(&self.0.error_kind).into_response()
    }
}

fn status_for(kind: &ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Config(config_error_kind) => match config_error_kind {
            ConfigErrorKind::MissingProviderConfiguration
            | ConfigErrorKind::InvalidProvider(_)
            | ConfigErrorKind::InvalidSettings(_)
            | ConfigErrorKind::InvalidOption(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR")
            }
        },
        ErrorKind::Exchange(exchange_error_kind) => match exchange_error_kind {
            ExchangeErrorKind::MissingParameter(_) => (StatusCode::BAD_REQUEST, "BAD REQUEST"),
            ExchangeErrorKind::Rejected { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ExchangeErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "GATEWAY TIMEOUT"),
            ExchangeErrorKind::Transport | ExchangeErrorKind::Decode => {
                (StatusCode::BAD_GATEWAY, "BAD GATEWAY")
            }
        },
        ErrorKind::Http(http_error_kind) => match http_error_kind {
            HttpErrorKind::BuilderFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR")
            }
            HttpErrorKind::RequestFailed => (StatusCode::BAD_GATEWAY, "BAD GATEWAY"),
        },
        ErrorKind::Session | ErrorKind::Event(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR")
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<FlowError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
