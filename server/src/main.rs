use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use event_crud_server::config::{Config, EventStoreKind, ImageStorageConfig};
use event_crud_server::routes::create_routes;
use event_crud_server::services::EventService;
use event_crud_server::state::AppState;
use event_crud_server::storage::images::{CloudinaryImageStore, ImageStore, LocalImageStore};
use event_crud_server::storage::{EventStore, MemoryEventStore, PgEventStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let mut pool = None;
    let events: Arc<dyn EventStore> = match config.event_store {
        EventStoreKind::Postgres => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&config.database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pg_pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Migrations run successfully");

            pool = Some(pg_pool.clone());
            Arc::new(PgEventStore::new(pg_pool))
        }
        EventStoreKind::Memory => {
            tracing::warn!("Using in-memory event store; events are lost on restart");
            Arc::new(MemoryEventStore::new())
        }
    };

    let images: Arc<dyn ImageStore> = match &config.image_storage {
        ImageStorageConfig::Local { dir } => {
            tokio::fs::create_dir_all(dir)
                .await
                .expect("Failed to create upload directory");
            tracing::info!(dir = %dir.display(), "Storing images on local disk");
            Arc::new(LocalImageStore::new(dir.clone()))
        }
        ImageStorageConfig::Cloudinary(cloudinary) => {
            tracing::info!(folder = %cloudinary.folder, "Storing images on Cloudinary");
            Arc::new(
                CloudinaryImageStore::new(cloudinary.clone())
                    .expect("Failed to build media host client"),
            )
        }
    };

    let state = AppState::new(
        EventService::new(events, images),
        config.public_base_url.clone(),
    );
    let app: Router = create_routes(state, &config);

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
