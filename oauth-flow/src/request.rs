//! Host facing interfaces: the inbound request, its session and the response.
//!
//! The core never touches a web framework directly. Hosts adapt their own
//! request and session types to these traits.

use async_trait::async_trait;

use crate::error::Error;

/// Read-only view of an inbound HTTP request.
pub trait RequestView: Send + Sync {
    /// Query string parameter.
    fn query(&self, key: &str) -> Option<String>;

    /// Submitted body field (form or JSON).
    fn body_field(&self, key: &str) -> Option<String>;

    /// Parameter captured by the host's router.
    fn route_param(&self, key: &str) -> Option<String>;

    /// Session bound to this request.
    fn session(&self) -> &dyn SessionStore;
}

/// Key/value access to the server side session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, Error>;

    async fn write(&self, key: &str, value: &str) -> Result<(), Error>;

    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// The part of the response the flow is allowed to shape.
pub trait ResponseBuilder: Send {
    /// Instruct the host to redirect the client to `location`.
    fn redirect(&mut self, location: &str);
}
