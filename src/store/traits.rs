use crate::error::Result;
use crate::model::{Feature, Id, Model, Schema};

/// Storage collaborator for schemas.
///
/// `insert_*` assigns the id of a not-yet-persisted entity and refuses one
/// that already has an id; `update_*` replaces an existing entity. Callers
/// are expected to hold the entity's lock set while writing.
#[async_trait::async_trait]
pub trait SchemaStore: Send + Sync {
    async fn get_schema(&self, id: &Id) -> Result<Option<Schema>>;
    async fn list_schemas(&self) -> Result<Vec<Schema>>;
    async fn insert_schema(&self, schema: Schema) -> Result<Schema>;
    /// Fails if a model using the schema would no longer satisfy it
    async fn update_schema(&self, schema: Schema) -> Result<Schema>;
}

#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>>;
    async fn list_models(&self) -> Result<Vec<Model>>;
    async fn insert_model(&self, model: Model) -> Result<Model>;
    async fn update_model(&self, model: Model) -> Result<Model>;
}

#[async_trait::async_trait]
pub trait FeatureStore: Send + Sync {
    async fn get_feature(&self, id: &Id) -> Result<Option<Feature>>;
    /// Features built from `model_id` directly or through inheritance
    async fn list_features_for_model(&self, model_id: &Id) -> Result<Vec<Feature>>;
    async fn insert_feature(&self, feature: Feature) -> Result<Feature>;
    async fn update_feature(&self, feature: Feature) -> Result<Feature>;
}

pub trait Store: SchemaStore + ModelStore + FeatureStore + Send + Sync {}
