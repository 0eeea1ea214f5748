use axum::{routing::get, Router};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use coursehub_service::{
    build_app, config::AppConfig, ensure_schema_exists, init_db, ApiDoc, PaymentService,
};

use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = init_db(&config.database_url).await?;
    ensure_schema_exists(&db).await?;
    tracing::info!("Database schema initialized");

    let payments = Arc::new(PaymentService::from_config(&config.stripe));

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { "Hello from Coursehub!" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(build_app(Arc::new(db), payments))
        .layer(cors_layer);

    start_server(app, config.bind_addr).await?;

    Ok(())
}

async fn start_server(
    app: Router,
    addr: std::net::SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Server started on {}", addr);

    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            axum::serve(listener, app.into_make_service()).await?;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to bind to address: {}", e);
            Err(e.into())
        }
    }
}
