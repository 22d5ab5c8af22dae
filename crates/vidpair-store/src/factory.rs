use crate::{CouchStore, DocumentStore, StoreError, StoreResult};
use std::sync::Arc;
use vidpair_core::StoreConfig;

/// Create a store backend from configuration
pub fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    config
        .validate()
        .map_err(|e| StoreError::Config(e.to_string()))?;

    let store = CouchStore::new(config)?;
    tracing::info!(database_url = %store.database_url(), "Document store configured");
    Ok(Arc::new(store))
}
