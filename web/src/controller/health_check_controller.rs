use axum::http::StatusCode;
use axum::response::IntoResponse;

/// GET health of the gateway
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "healthy")
}
