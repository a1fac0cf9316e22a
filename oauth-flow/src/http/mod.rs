//! HTTP client building for provider collaborators.

mod client;

pub use client::{HttpClientBuilder, HttpClientConfig};
