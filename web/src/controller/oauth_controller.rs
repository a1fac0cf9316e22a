//! Controller for third-party OAuth authentication.
//!
//! One endpoint serves both legs of the flow: a request without a provider
//! `code` is redirected to the provider, the provider's callback is exchanged
//! for a token.

use crate::controller::ApiResponse;
use crate::extractors::oauth_request::OAuthRequest;
use crate::{AppState, Error};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use log::*;
use oauth_flow::config::Map;
use oauth_flow::exchange::TokenResult;
use oauth_flow::flow::AuthenticationFlow;
use oauth_flow::request::ResponseBuilder;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Authenticated {
    pub provider: String,
    /// Raw token payload returned by the provider.
    pub result: TokenResult,
    /// The payload after applying the provider's `mapFields`.
    pub user: Map,
}

/// Collects the redirect the flow asks for.
#[derive(Debug, Default)]
struct PendingRedirect {
    location: Option<String>,
}

impl ResponseBuilder for PendingRedirect {
    fn redirect(&mut self, location: &str) {
        self.location = Some(location.to_string());
    }
}

/// GET|POST /oauth/{provider}
///
/// Authenticates a provider callback, or starts the flow by redirecting to the
/// provider's authorization page. Responds 401 when neither applies.
pub async fn authenticate(
    State(app_state): State<AppState>,
    request: OAuthRequest,
) -> Result<Response, Error> {
    let flow = AuthenticationFlow::new(app_state.registry(), app_state.events.clone())
        .with_options(app_state.flow_options());

    if let Some(result) = flow.authenticate(&request).await {
        let provider = flow
            .provider(&request)
            .map(|provider| provider.alias().to_string())
            .unwrap_or_default();
        let user = flow.map_fields(&result).unwrap_or_default();
        info!("Authenticated through provider `{}`", provider);

        return Ok(ApiResponse::ok(Authenticated {
            provider,
            result,
            user,
        })
        .into_response());
    }

    let mut redirect = PendingRedirect::default();
    flow.unauthenticated(&request, &mut redirect).await?;

    match redirect.location {
        Some(location) => Ok(Redirect::to(&location).into_response()),
        None => {
            debug!("Request could not be authenticated");
            Ok(ApiResponse::status(StatusCode::UNAUTHORIZED).into_response())
        }
    }
}
