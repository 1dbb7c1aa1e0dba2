use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Schemas
        .route(
            "/schemas",
            get(handlers::list_schemas::<S>).post(handlers::create_schema::<S>),
        )
        .route(
            "/schemas/:schema_id",
            get(handlers::get_schema::<S>).put(handlers::update_schema::<S>),
        )
        // Models
        .route(
            "/models",
            get(handlers::list_models::<S>).post(handlers::create_model::<S>),
        )
        .route(
            "/models/:model_id",
            get(handlers::get_model::<S>).put(handlers::update_model::<S>),
        )
        .route(
            "/models/:model_id/features",
            get(handlers::list_features_for_model::<S>),
        )
        // Features
        .route("/features", post(handlers::create_feature::<S>))
        .route(
            "/features/:feature_id",
            get(handlers::get_feature::<S>).put(handlers::update_feature::<S>),
        )
        // Locking diagnostics
        .route("/locks", get(handlers::list_held_locks::<S>))
        .route("/resources/:resource_key", get(handlers::decode_resource_key))
}
