use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use log::error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::StoreError;
use crate::logic::FeatureOperations;
use crate::model::{
    Feature, FeatureUpdate, Id, Model, ModelUpdate, NewFeature, NewModel, NewSchema, ResourceKey,
    ResourceKind, Schema, SchemaUpdate,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<FeatureOperations<S>>;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;
type CreatedResult<T> = Result<(StatusCode, Json<T>), ApiError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn from_items(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeldLocksResponse {
    pub held: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceKeyResponse {
    pub key: String,
    pub kind: ResourceKind,
    pub identifier: String,
}

fn error_response(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::LockAcquisitionFailed { .. } | StoreError::Conflict(_) => StatusCode::CONFLICT,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    }
    (status, Json(ErrorResponse::new(&e.to_string())))
}

fn not_found(what: &str, id: &Id) -> ApiError {
    error_response(StoreError::not_found(format!("{} '{}'", what, id)))
}

/// Parse a request body ourselves so property decoding errors come back as 400
/// with the decoder's message instead of axum's generic rejection.
fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(&format!("Invalid request body: {}", e))),
        )
    })
}

// Schemas

pub async fn list_schemas<S: Store + 'static>(
    State(ops): State<AppState<S>>,
) -> ApiResult<ListResponse<Schema>> {
    let schemas = ops.store().list_schemas().await.map_err(error_response)?;
    Ok(Json(ListResponse::from_items(schemas)))
}

pub async fn get_schema<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(schema_id): Path<Id>,
) -> ApiResult<Schema> {
    match ops.store().get_schema(&schema_id).await {
        Ok(Some(schema)) => Ok(Json(schema)),
        Ok(None) => Err(not_found("schema", &schema_id)),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn create_schema<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> CreatedResult<Schema> {
    let new_schema: NewSchema = parse_body(body)?;
    let schema = ops.create_schema(new_schema).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(schema)))
}

pub async fn update_schema<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(schema_id): Path<Id>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> ApiResult<Schema> {
    let update: SchemaUpdate = parse_body(body)?;
    let schema = ops
        .update_schema(&schema_id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(schema))
}

// Models

pub async fn list_models<S: Store + 'static>(
    State(ops): State<AppState<S>>,
) -> ApiResult<ListResponse<Model>> {
    let models = ops.store().list_models().await.map_err(error_response)?;
    Ok(Json(ListResponse::from_items(models)))
}

pub async fn get_model<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(model_id): Path<Id>,
) -> ApiResult<Model> {
    match ops.store().get_model(&model_id).await {
        Ok(Some(model)) => Ok(Json(model)),
        Ok(None) => Err(not_found("model", &model_id)),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn create_model<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> CreatedResult<Model> {
    let new_model: NewModel = parse_body(body)?;
    let model = ops.create_model(new_model).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(model)))
}

pub async fn update_model<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(model_id): Path<Id>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> ApiResult<Model> {
    let update: ModelUpdate = parse_body(body)?;
    let model = ops
        .update_model(&model_id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(model))
}

pub async fn list_features_for_model<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(model_id): Path<Id>,
) -> ApiResult<ListResponse<Feature>> {
    let features = ops
        .store()
        .list_features_for_model(&model_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ListResponse::from_items(features)))
}

// Features

pub async fn get_feature<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(feature_id): Path<Id>,
) -> ApiResult<Feature> {
    match ops.store().get_feature(&feature_id).await {
        Ok(Some(feature)) => Ok(Json(feature)),
        Ok(None) => Err(not_found("feature", &feature_id)),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn create_feature<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> CreatedResult<Feature> {
    let new_feature: NewFeature = parse_body(body)?;
    let feature = ops
        .create_feature(new_feature)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(feature)))
}

pub async fn update_feature<S: Store + 'static>(
    State(ops): State<AppState<S>>,
    Path(feature_id): Path<Id>,
    RequestJson(body): RequestJson<serde_json::Value>,
) -> ApiResult<Feature> {
    let update: FeatureUpdate = parse_body(body)?;
    let feature = ops
        .update_feature(&feature_id, update)
        .await
        .map_err(error_response)?;
    Ok(Json(feature))
}

// Locking diagnostics

pub async fn list_held_locks<S: Store + 'static>(
    State(ops): State<AppState<S>>,
) -> Json<HeldLocksResponse> {
    Json(HeldLocksResponse {
        held: ops.coordinator().lock_manager().held_keys(),
    })
}

pub async fn decode_resource_key(
    Path(resource_key): Path<String>,
) -> ApiResult<ResourceKeyResponse> {
    let key = ResourceKey::decode(&resource_key).map_err(error_response)?;
    Ok(Json(ResourceKeyResponse {
        key: key.encode().to_string(),
        kind: key.kind(),
        identifier: key.identifier().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::create_router;
    use crate::lock::InMemoryLockManager;
    use crate::logic::MutationCoordinator;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let ops = FeatureOperations::new(
            Arc::new(MemoryStore::new()),
            MutationCoordinator::new(Arc::new(InMemoryLockManager::new())),
        );
        create_router::<MemoryStore>().with_state(Arc::new(ops))
    }

    async fn send(
        app: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_schema_model_feature_flow() {
        let app = app();

        let (status, schema) = send(
            &app,
            "POST",
            "/schemas",
            Some(json!({
                "name": "bike-schema",
                "kind": "model",
                "fields": [{"key": "wheels", "kind": "integer", "required": true}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let schema_id = schema["id"].as_str().unwrap().to_string();

        let (status, model) = send(
            &app,
            "POST",
            "/models",
            Some(json!({
                "name": "bike",
                "schema_id": schema_id,
                "properties": [{"key": "wheels", "kind": "integer", "value": 2}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let model_id = model["id"].as_str().unwrap().to_string();

        let (status, feature) = send(
            &app,
            "POST",
            "/features",
            Some(json!({
                "name": "tandem",
                "model_id": model_id,
                "properties": [{"key": "wheels", "kind": "integer", "value": 2}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(feature["transitive_ancestor_model_ids"], json!([model_id]));

        let uri = format!("/models/{}/features", model_id);
        let (status, listed) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);

        let (status, locks) = send(&app, "GET", "/locks", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(locks["held"], json!([]));
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let app = app();

        let (status, _) = send(&app, "GET", "/models/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Unknown kind tag in a property is rejected before anything is written
        let (status, body) = send(
            &app,
            "POST",
            "/features",
            Some(json!({
                "name": "x",
                "model_id": "m",
                "properties": [{"key": "k", "kind": "function", "value": 1}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("function"));

        let (status, _) = send(
            &app,
            "POST",
            "/models",
            Some(json!({"name": "m", "schema_id": "missing"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_decode_resource_key_endpoint() {
        let app = app();
        let (status, body) = send(&app, "GET", "/resources/MODEL_SCHEMA:s-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "MODEL_SCHEMA");
        assert_eq!(body["identifier"], "s-1");

        let (status, _) = send(&app, "GET", "/resources/GADGET:s-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
