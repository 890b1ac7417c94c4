use axum::{
    routing::{get, post},
    Router,
};
use gst_invoice_import::{api, create_pool, AppConfig, ImportService};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Local-time log format.
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    let pool = create_pool(&config.database.url).await?;
    info!("Database pool created");

    let service = Arc::new(ImportService::new(pool));

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/import/invoices/preview", post(api::preview_invoices))
        .route("/api/import/invoices", post(api::import_invoices))
        .route("/api/import/clients/preview", post(api::preview_clients))
        .route("/api/import/clients", post(api::import_clients))
        .route("/api/export/invoices", get(api::export_invoices))
        .with_state(service)
        .layer(ServiceBuilder::new());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/import/invoices/preview - reconcile only");
    info!("  POST /api/import/invoices         - reconcile and commit");
    info!("  POST /api/import/clients/preview  - reconcile only");
    info!("  POST /api/import/clients          - reconcile and commit");
    info!("  GET  /api/export/invoices         - round-trip CSV export");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
