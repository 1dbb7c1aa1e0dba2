pub mod api;
pub mod config;
pub mod error;
pub mod lock;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{Result, StoreError};
pub use lock::{InMemoryLockManager, LockGuard, LockManager, LockOwner};
pub use logic::{FeatureOperations, MutationCoordinator};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, Store};

use std::sync::Arc;
use tokio::net::TcpListener;

/// Router over a fresh in-memory store, locking configured from `config`
pub fn build_app(config: &crate::config::AppConfig) -> axum::Router {
    app_with_store(Arc::new(MemoryStore::new()), Arc::new(config.lock_manager()))
}

pub fn app_with_store<S: Store + 'static>(
    store: Arc<S>,
    locks: Arc<dyn LockManager>,
) -> axum::Router {
    let ops = FeatureOperations::new(store, MutationCoordinator::new(locks));
    routes::create_router::<S>().with_state(Arc::new(ops))
}

/// Serve the API on an already bound listener until the server stops
pub async fn serve(
    listener: TcpListener,
    config: &crate::config::AppConfig,
) -> anyhow::Result<()> {
    log::info!("Feature store listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_app(config)).await?;
    Ok(())
}

