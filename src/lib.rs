use axum::{Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api_docs;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;

// Re-export commonly used items for easier use in tests
pub use api_docs::ApiDoc;
pub use auth::middleware::auth_middleware;
pub use db::{ensure_schema_exists, init_db};
pub use services::payment_service::PaymentService;

/// The API with its shared state attached. The binary adds docs and CORS on
/// top; tests drive this directly.
pub fn build_app(db: Arc<DatabaseConnection>, payments: Arc<PaymentService>) -> Router {
    routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(Extension(payments))
        .layer(Extension(db))
}
