pub(crate) mod oauth_request;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
