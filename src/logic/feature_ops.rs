use log::warn;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::logic::MutationCoordinator;
use crate::model::{
    Entity, Feature, FeatureUpdate, Id, Model, ModelUpdate, NewFeature, NewModel, NewSchema,
    ResourceKey, Schema, SchemaUpdate,
};
use crate::store::traits::Store;

/// Create and update entry points; every write goes through the coordinator.
///
/// Updates plan their lock set from the current record, then re-read and
/// re-apply the change under the locks. If the re-read record would need a
/// lock that is not held (it was changed in between), the update is refused
/// with `Conflict` rather than written unprotected.
pub struct FeatureOperations<S: Store> {
    store: Arc<S>,
    coordinator: MutationCoordinator,
}

impl<S: Store + 'static> FeatureOperations<S> {
    pub fn new(store: Arc<S>, coordinator: MutationCoordinator) -> Self {
        Self { store, coordinator }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub async fn create_schema(&self, new_schema: NewSchema) -> Result<Schema> {
        let schema = Schema::from_new(new_schema);
        let store = self.store.clone();
        let pending = schema.clone();
        self.coordinator
            .perform(&schema, move || async move { store.insert_schema(pending).await })
            .await
    }

    pub async fn update_schema(&self, id: &Id, update: SchemaUpdate) -> Result<Schema> {
        let mut planned = self.load_schema(id).await?;
        planned.apply_update(update.clone());
        let planned_keys = planned.full_lock_set()?;

        let store = self.store.clone();
        let id = id.clone();
        self.coordinator
            .perform(&planned, move || async move {
                let mut fresh = store
                    .get_schema(&id)
                    .await?
                    .ok_or_else(|| StoreError::not_found(format!("schema '{}'", id)))?;
                fresh.apply_update(update);
                ensure_covered(&fresh, &planned_keys)?;
                store.update_schema(fresh).await
            })
            .await
    }

    pub async fn create_model(&self, new_model: NewModel) -> Result<Model> {
        let model = Model::from_new(new_model);
        let store = self.store.clone();
        let pending = model.clone();
        self.coordinator
            .perform(&model, move || async move { store.insert_model(pending).await })
            .await
    }

    pub async fn update_model(&self, id: &Id, update: ModelUpdate) -> Result<Model> {
        let mut planned = self.load_model(id).await?;
        planned.apply_update(update.clone());
        let planned_keys = planned.full_lock_set()?;

        let store = self.store.clone();
        let id = id.clone();
        self.coordinator
            .perform(&planned, move || async move {
                let mut fresh = store
                    .get_model(&id)
                    .await?
                    .ok_or_else(|| StoreError::not_found(format!("model '{}'", id)))?;
                fresh.apply_update(update);
                ensure_covered(&fresh, &planned_keys)?;
                store.update_model(fresh).await
            })
            .await
    }

    pub async fn create_feature(&self, new_feature: NewFeature) -> Result<Feature> {
        let feature = Feature::from_new(new_feature);
        let store = self.store.clone();
        let pending = feature.clone();
        self.coordinator
            .perform(&feature, move || async move { store.insert_feature(pending).await })
            .await
    }

    pub async fn update_feature(&self, id: &Id, update: FeatureUpdate) -> Result<Feature> {
        let mut planned = self.load_feature(id).await?;
        planned.apply_update(update.clone());
        let planned_keys = planned.full_lock_set()?;

        let store = self.store.clone();
        let id = id.clone();
        self.coordinator
            .perform(&planned, move || async move {
                let mut fresh = store
                    .get_feature(&id)
                    .await?
                    .ok_or_else(|| StoreError::not_found(format!("feature '{}'", id)))?;
                fresh.apply_update(update);
                ensure_covered(&fresh, &planned_keys)?;
                store.update_feature(fresh).await
            })
            .await
    }

    async fn load_schema(&self, id: &Id) -> Result<Schema> {
        self.store
            .get_schema(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("schema '{}'", id)))
    }

    async fn load_model(&self, id: &Id) -> Result<Model> {
        self.store
            .get_model(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("model '{}'", id)))
    }

    async fn load_feature(&self, id: &Id) -> Result<Feature> {
        self.store
            .get_feature(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("feature '{}'", id)))
    }
}

fn ensure_covered<E: Entity>(fresh: &E, held: &BTreeSet<ResourceKey>) -> Result<()> {
    let needed = fresh.full_lock_set()?;
    if let Some(missing) = needed.difference(held).next() {
        warn!("Refusing write: {} is needed but not held", missing);
        return Err(StoreError::Conflict(format!(
            "record changed while waiting for locks; {} is not held",
            missing
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{InMemoryLockManager, LockManager, LockOwner};
    use crate::model::{FieldDef, Property, PropertyValue, SchemaKind, ValueKind};
    use crate::store::traits::FeatureStore;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn operations(locks: Arc<dyn LockManager>) -> FeatureOperations<MemoryStore> {
        FeatureOperations::new(Arc::new(MemoryStore::new()), MutationCoordinator::new(locks))
    }

    async fn bike_model(ops: &FeatureOperations<MemoryStore>) -> (Schema, Model) {
        let schema = ops
            .create_schema(NewSchema {
                name: "bike-schema".to_string(),
                kind: SchemaKind::Model,
                fields: vec![
                    FieldDef::required("wheels", ValueKind::Integer),
                    FieldDef::optional("color", ValueKind::Text),
                ],
                properties: vec![],
            })
            .await
            .unwrap();
        let model = ops
            .create_model(NewModel {
                name: "bike".to_string(),
                parent_model_ids: BTreeSet::new(),
                schema_id: schema.id.clone().unwrap(),
                properties: vec![
                    Property::of("wheels", 2).unwrap(),
                    Property::of("color", "black").unwrap(),
                ],
            })
            .await
            .unwrap();
        (schema, model)
    }

    #[tokio::test]
    async fn test_create_and_update_feature() {
        let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        let ops = operations(locks.clone());
        let (_, model) = bike_model(&ops).await;

        let feature = ops
            .create_feature(NewFeature {
                name: "commuter".to_string(),
                model_id: model.id.clone().unwrap(),
                properties: vec![Property::of("color", "red").unwrap()],
            })
            .await
            .unwrap();
        assert!(feature.id.is_some());
        assert!(locks.held_keys().is_empty());

        let updated = ops
            .update_feature(
                feature.id.as_ref().unwrap(),
                FeatureUpdate {
                    properties: Some(vec![Property::of("color", "blue").unwrap()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, feature.id);
        assert_eq!(
            updated.properties[0].value(),
            &PropertyValue::Text("blue".to_string())
        );
        assert!(locks.held_keys().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_entity_is_not_found() {
        let ops = operations(Arc::new(InMemoryLockManager::new()));
        let result = ops
            .update_model(&"missing".to_string(), ModelUpdate::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_feature_create_waits_for_model_update() {
        let locks = Arc::new(InMemoryLockManager::with_timeout(Duration::from_millis(50)));
        let ops = operations(locks.clone());
        let (_, model) = bike_model(&ops).await;
        let model_key = ResourceKey::model(model.id.as_ref().unwrap()).unwrap();

        // Someone else is in the middle of changing the model
        let other = LockOwner::new();
        locks
            .acquire(&other, &[model_key.encode().to_string()])
            .await
            .unwrap();

        let blocked = ops
            .create_feature(NewFeature {
                name: "commuter".to_string(),
                model_id: model.id.clone().unwrap(),
                properties: vec![],
            })
            .await;
        assert!(matches!(blocked, Err(StoreError::LockAcquisitionFailed { .. })));
        assert!(ops
            .store()
            .list_features_for_model(model.id.as_ref().unwrap())
            .await
            .unwrap()
            .is_empty());

        locks.release(&other, &[model_key.encode().to_string()]);
        assert!(ops
            .create_feature(NewFeature {
                name: "commuter".to_string(),
                model_id: model.id.clone().unwrap(),
                properties: vec![],
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_validation_failure_releases_locks() {
        let locks: Arc<dyn LockManager> = Arc::new(InMemoryLockManager::new());
        let ops = operations(locks.clone());
        let (_, model) = bike_model(&ops).await;

        let result = ops
            .create_feature(NewFeature {
                name: "commuter".to_string(),
                model_id: model.id.clone().unwrap(),
                properties: vec![Property::of("turbo", true).unwrap()],
            })
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(locks.held_keys().is_empty());
    }

    #[test]
    fn test_ensure_covered_reports_missing_key() {
        let mut feature = Feature::new("f", "m2");
        feature.id = Some("f1".to_string());
        let held = BTreeSet::from([
            ResourceKey::feature("f1").unwrap(),
            ResourceKey::model("m1").unwrap(),
        ]);
        assert!(matches!(
            ensure_covered(&feature, &held),
            Err(StoreError::Conflict(_))
        ));

        feature.model_id = "m1".to_string();
        assert!(ensure_covered(&feature, &held).is_ok());
    }
}
