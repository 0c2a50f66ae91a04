//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the start-up reconciliation pass.
//!
//! ## Intended use
//! Useful for development and debugging. The workspace's main `catalog-run` binary reconciles
//! the storage directory first and then serves the same router.

use api_rest::AppState;
use catalog_core::config::{max_upload_bytes_from_env_value, storage_dir_from_env_value};
use catalog_core::constants::{MAX_UPLOAD_BYTES_ENV, STORAGE_DIR_ENV};
use catalog_core::{CatalogService, CoreConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the catalog REST API server
///
/// # Environment Variables
/// - `CATALOG_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CATALOG_STORAGE_DIR`: Storage directory (default: "uploads")
/// - `CATALOG_MAX_UPLOAD_BYTES`: Request body limit (default: 512 MiB)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the storage directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("catalog_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CATALOG_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let storage_dir = storage_dir_from_env_value(std::env::var(STORAGE_DIR_ENV).ok());
    let max_upload_bytes = max_upload_bytes_from_env_value(std::env::var(MAX_UPLOAD_BYTES_ENV).ok())?;

    let cfg = Arc::new(CoreConfig::new(storage_dir)?);
    let catalog = Arc::new(CatalogService::new(cfg)?);

    api_rest::serve(&addr, AppState::new(catalog), max_upload_bytes).await
}
