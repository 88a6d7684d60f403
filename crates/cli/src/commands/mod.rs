//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use std::sync::Arc;

use wanderlance_api::config::StorageConfig;
use wanderlance_api::db::{self, Store};

/// Open the store selected by `STORAGE_BACKEND`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the store cannot be
/// opened.
pub async fn open_store() -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = StorageConfig::from_env()?;
    let store = db::connect(&config).await?;
    tracing::info!(backend = store.backend(), "Store opened");
    Ok(store)
}
