use std::sync::Arc;

use anyhow::Context;
use order_desk::{
    app::order::{OrderService, OrderStore},
    build_router,
    infrastructure::{
        config::{AppConfig, StoreBackend},
        logger::Logger,
        memory_store::MemoryOrderStore,
    },
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    Logger::init(&config.logging);

    info!("Starting order desk server...");

    let store = open_store(&config).await?;
    let order_service = OrderService::new(store, &config.batch);
    let app = build_router(order_service, &config.server);

    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    let addr = listener.local_addr()?;

    info!("🚀 Order desk running on http://{}", addr);
    info!("📊 Available endpoints:");
    info!("   GET    /health           - Health check");
    info!("   GET    /orders           - List orders");
    info!("   POST   /orders           - Create order");
    info!("   POST   /orders/process   - Process all pending orders");
    info!("   GET    /orders/:id       - Order details");
    info!("   PUT    /orders/:id       - Edit order");
    info!("   DELETE /orders/:id       - Delete order");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory order store, orders are lost on restart");
            Ok(Arc::new(MemoryOrderStore::new()))
        }
        #[cfg(feature = "database")]
        StoreBackend::Postgres => {
            use order_desk::infrastructure::database::DatabaseManager;

            let db = DatabaseManager::new(&config.database)
                .await
                .context("failed to connect to database")?;
            db.create_tables()
                .await
                .context("failed to create tables")?;
            Ok(Arc::new(db.order_store()))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Postgres => {
            anyhow::bail!("the postgres backend requires the `database` feature")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
