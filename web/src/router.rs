use crate::{
    controller::{health_check_controller, oauth_controller},
    AppState,
};
use axum::{routing::get, Router};

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(oauth_routes(app_state))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// Routes for third-party OAuth authentication
fn oauth_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/oauth/{provider}",
            get(oauth_controller::authenticate).post(oauth_controller::authenticate),
        )
        .with_state(app_state)
}
