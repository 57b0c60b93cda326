use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full router with the shared services attached.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/emails", post(routes::send_email))
        .route("/emails/:id", get(routes::get_job))
        .layer(Extension(services))
}
