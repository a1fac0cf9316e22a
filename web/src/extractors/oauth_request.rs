use crate::extractors::RejectionType;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
};
use log::*;
use oauth_flow::error::{session_error, Error as FlowError};
use oauth_flow::request::{RequestView, SessionStore};
use serde_json::Value;
use std::collections::HashMap;
use tower_sessions::Session;

/// An inbound OAuth request as seen by the authentication flow.
///
/// Captures route parameters, the query string, submitted body fields (form
/// or JSON) and the `tower-sessions` session.
pub struct OAuthRequest {
    route: HashMap<String, String>,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    session: OAuthSession,
}

impl<S> FromRequest<S> for OAuthRequest
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        let Path(route) = Path::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        let session = Session::from_request_parts(&mut parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()))?;

        let query = parts.uri.query().map(parse_form).unwrap_or_default();
        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let bytes = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| {
                let response = e.into_response();
                (response.status(), "Unable to read request body".to_string())
            })?;
        let body = parse_body(&content_type, &bytes)
            .ok_or((StatusCode::BAD_REQUEST, "Malformed JSON body".to_string()))?;

        Ok(Self {
            route,
            query,
            body,
            session: OAuthSession(session),
        })
    }
}

impl RequestView for OAuthRequest {
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

/// `tower-sessions` backed session storage for state tokens.
pub struct OAuthSession(Session);

#[async_trait]
impl SessionStore for OAuthSession {
    async fn read(&self, key: &str) -> Result<Option<String>, FlowError> {
        self.0.get::<String>(key).await.map_err(session_error)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), FlowError> {
        self.0.insert(key, value).await.map_err(session_error)
    }

    async fn delete(&self, key: &str) -> Result<(), FlowError> {
        self.0
            .remove::<String>(key)
            .await
            .map(|_| ())
            .map_err(session_error)
    }
}

fn parse_form(input: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

// JSON bodies contribute their top level scalar fields. An empty body is no
// fields at all; `None` means the body claimed to be JSON but wasn't.
fn parse_body(content_type: &str, bytes: &[u8]) -> Option<HashMap<String, String>> {
    if bytes.is_empty() {
        return Some(HashMap::new());
    }

    if !content_type.starts_with("application/json") {
        return Some(parse_form(&String::from_utf8_lossy(bytes)));
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) => Some(
            fields
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(s) => Some((key, s)),
                    Value::Number(n) => Some((key, n.to_string())),
                    Value::Bool(b) => Some((key, b.to_string())),
                    _ => None,
                })
                .collect(),
        ),
        Ok(_) => Some(HashMap::new()),
        Err(e) => {
            debug!("Rejecting malformed JSON body: {:?}", e);
            None
        }
    }
}
