//! Ledgerline API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use ledgerline_core::AppError;
use ledgerline_infrastructure::{InMemoryStore, PostgresStore};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageConfig, init_tracing};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let storage_backend = config.storage.backend_name();

    let app_state = match &config.storage {
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStore::connect(database_url, *max_connections).await?;
            store.migrate().await?;

            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            AppState::from_store(store, storage_backend)
        }
        StorageConfig::Memory => {
            warn!("using in-memory storage, all data is lost on shutdown");
            AppState::from_store(InMemoryStore::new(), storage_backend)
        }
    };

    let app = api_router::build_router(app_state);
    let address = config.socket_address()?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, storage_backend, "ledgerline-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
