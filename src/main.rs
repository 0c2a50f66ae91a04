use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use catalog_core::config::{max_upload_bytes_from_env_value, storage_dir_from_env_value};
use catalog_core::constants::{MAX_UPLOAD_BYTES_ENV, STORAGE_DIR_ENV};
use catalog_core::{CatalogError, CatalogService, CoreConfig};

/// Main entry point for the catalog application
///
/// Opens the storage directory, runs one reconciliation pass over it, and then serves the
/// REST API (with Swagger UI) until the server stops.
///
/// # Environment Variables
/// - `CATALOG_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CATALOG_STORAGE_DIR`: Directory for stored files and `data.json` (default: "uploads")
/// - `CATALOG_MAX_UPLOAD_BYTES`: Request body limit in bytes (default: 512 MiB)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, start-up reconciliation or the server fails. A
///   corrupt metadata document is logged instead, so the API can still report it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catalog_run=info".parse()?)
                .add_directive("catalog_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("CATALOG_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let storage_dir = storage_dir_from_env_value(std::env::var(STORAGE_DIR_ENV).ok());
    let max_upload_bytes =
        max_upload_bytes_from_env_value(std::env::var(MAX_UPLOAD_BYTES_ENV).ok())?;

    tracing::info!("++ Using storage directory {}", storage_dir.display());

    let cfg = Arc::new(CoreConfig::new(storage_dir)?);
    let catalog = Arc::new(CatalogService::new(cfg)?);

    match catalog.reconcile() {
        Ok(report) => tracing::info!(
            "++ Reconciled storage: {} preview reference(s) cleared, {} artifact(s) missing, {} staged upload(s) removed",
            report.cleared_previews.len(),
            report.missing_artifacts.len(),
            report.staged_files_removed
        ),
        // Requests answer 500 until the document is repaired.
        Err(e @ CatalogError::CorruptStore { .. }) => {
            tracing::error!("-- Skipping start-up reconciliation: {}", e)
        }
        Err(e) => return Err(e.into()),
    }

    api_rest::serve(&rest_addr, AppState::new(catalog), max_upload_bytes).await
}
