use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::error::{Result, StoreError};
use crate::logic::{Ancestry, Validator};
use crate::model::{generate_id, Feature, Id, Model, Schema, ValueKind};
use crate::store::traits::{FeatureStore, ModelStore, SchemaStore, Store};

#[derive(Debug, Default)]
struct Graph {
    schemas: HashMap<Id, Schema>,
    models: HashMap<Id, Model>,
    features: HashMap<Id, Feature>,
}

impl Graph {
    fn ancestry<'g>(&'g self) -> Ancestry<'g, impl Fn(&Id) -> Option<&'g Model> + 'g> {
        Ancestry::new(move |id: &Id| self.models.get(id))
    }

    /// Field kinds a model inherits through its parents, first parent wins on clashes
    fn inherited_fields(&self, model: &Model) -> Result<HashMap<String, ValueKind>> {
        let ancestry = self.ancestry();
        let mut inherited = HashMap::new();
        for parent in &model.parent_model_ids {
            for (key, kind) in ancestry.inherited_fields(parent)? {
                inherited.entry(key).or_insert(kind);
            }
        }
        Ok(inherited)
    }

    fn check_model(&self, model: &Model, schema: &Schema) -> Result<()> {
        self.ancestry().check_acyclic(model)?;
        let inherited = self.inherited_fields(model)?;
        Validator::validate_model(model, schema, &inherited)
    }

    /// Re-validate every model that inherits from `id`, directly or transitively
    fn check_descendants(&self, id: &Id) -> Result<()> {
        let ancestry = self.ancestry();
        for model in self.models.values() {
            let Some(model_id) = &model.id else { continue };
            if model_id == id {
                continue;
            }
            let inherits = ancestry
                .lineage(model_id)?
                .iter()
                .skip(1)
                .any(|ancestor| ancestor.id.as_ref() == Some(id));
            if inherits {
                self.check_model(model, self.schema_for(model)?)?;
            }
        }
        Ok(())
    }

    fn schema_for(&self, model: &Model) -> Result<&Schema> {
        self.schemas
            .get(&model.schema_id)
            .ok_or_else(|| StoreError::not_found(format!("schema '{}'", model.schema_id)))
    }

    /// Validate a feature and return the ids of its model lineage
    fn check_feature(&self, feature: &Feature) -> Result<BTreeSet<Id>> {
        let ancestry = self.ancestry();
        let fields = ancestry.inherited_fields(&feature.model_id)?;
        Validator::validate_feature(feature, &fields)?;
        Ok(ancestry
            .lineage(&feature.model_id)?
            .into_iter()
            .filter_map(|model| model.id.clone())
            .collect())
    }
}

/// Reference storage collaborator keeping the whole graph in memory.
///
/// Each call is atomic on its own; callers serialize related writes through
/// the mutation coordinator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    graph: RwLock<Graph>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn refuse_existing_id(kind: &str, id: &Option<Id>) -> Result<()> {
    match id {
        Some(id) => Err(StoreError::validation(format!(
            "{} '{}' already has an id and cannot be created again",
            kind, id
        ))),
        None => Ok(()),
    }
}

fn require_id(kind: &str, id: &Option<Id>) -> Result<Id> {
    id.clone()
        .ok_or_else(|| StoreError::validation(format!("{} has not been persisted yet", kind)))
}

#[async_trait::async_trait]
impl SchemaStore for MemoryStore {
    async fn get_schema(&self, id: &Id) -> Result<Option<Schema>> {
        Ok(self.graph.read().schemas.get(id).cloned())
    }

    async fn list_schemas(&self) -> Result<Vec<Schema>> {
        let mut schemas: Vec<Schema> = self.graph.read().schemas.values().cloned().collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(schemas)
    }

    async fn insert_schema(&self, mut schema: Schema) -> Result<Schema> {
        refuse_existing_id("schema", &schema.id)?;
        Validator::validate_schema(&schema)?;

        let id = generate_id();
        schema.id = Some(id.clone());
        self.graph.write().schemas.insert(id.clone(), schema.clone());
        info!("Created schema '{}' ({})", schema.name, id);
        Ok(schema)
    }

    async fn update_schema(&self, mut schema: Schema) -> Result<Schema> {
        let id = require_id("schema", &schema.id)?;
        let mut graph = self.graph.write();
        let existing = graph
            .schemas
            .get(&id)
            .ok_or_else(|| StoreError::not_found(format!("schema '{}'", id)))?;
        if existing.kind != schema.kind {
            return Err(StoreError::validation(format!(
                "schema '{}' cannot change its kind",
                id
            )));
        }
        schema.created_at = existing.created_at;
        Validator::validate_schema(&schema)?;

        for model in graph.models.values().filter(|m| m.schema_id == id) {
            graph.check_model(model, &schema)?;
        }

        graph.schemas.insert(id.clone(), schema.clone());
        info!("Updated schema '{}' ({})", schema.name, id);
        Ok(schema)
    }
}

#[async_trait::async_trait]
impl ModelStore for MemoryStore {
    async fn get_model(&self, id: &Id) -> Result<Option<Model>> {
        Ok(self.graph.read().models.get(id).cloned())
    }

    async fn list_models(&self) -> Result<Vec<Model>> {
        let mut models: Vec<Model> = self.graph.read().models.values().cloned().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(models)
    }

    async fn insert_model(&self, mut model: Model) -> Result<Model> {
        refuse_existing_id("model", &model.id)?;
        let mut graph = self.graph.write();
        graph.check_model(&model, graph.schema_for(&model)?)?;

        let id = generate_id();
        model.id = Some(id.clone());
        graph.models.insert(id.clone(), model.clone());
        info!("Created model '{}' ({})", model.name, id);
        Ok(model)
    }

    async fn update_model(&self, mut model: Model) -> Result<Model> {
        let id = require_id("model", &model.id)?;
        let mut graph = self.graph.write();
        let created_at = graph
            .models
            .get(&id)
            .map(|existing| existing.created_at)
            .ok_or_else(|| StoreError::not_found(format!("model '{}'", id)))?;
        graph.check_model(&model, graph.schema_for(&model)?)?;
        model.created_at = created_at;
        let previous = graph.models.insert(id.clone(), model.clone());

        // Descendants may rely on what this model used to supply
        if let Err(e) = graph.check_descendants(&id) {
            if let Some(previous) = previous {
                graph.models.insert(id.clone(), previous);
            }
            return Err(e);
        }

        // Refresh the ancestry cache of features that inherit through this model
        let refreshed: Vec<(Id, BTreeSet<Id>)> = {
            let ancestry = graph.ancestry();
            graph
                .features
                .iter()
                .filter(|(_, f)| {
                    f.transitive_ancestor_model_ids
                        .as_ref()
                        .map_or(true, |ids| ids.contains(&id))
                })
                .filter_map(|(feature_id, f)| {
                    let lineage = ancestry.lineage(&f.model_id).ok()?;
                    let ids = lineage.into_iter().filter_map(|m| m.id.clone()).collect();
                    Some((feature_id.clone(), ids))
                })
                .collect()
        };
        for (feature_id, ids) in refreshed {
            if let Some(feature) = graph.features.get_mut(&feature_id) {
                feature.transitive_ancestor_model_ids = Some(ids);
            }
        }

        info!("Updated model '{}' ({})", model.name, id);
        Ok(model)
    }
}

#[async_trait::async_trait]
impl FeatureStore for MemoryStore {
    async fn get_feature(&self, id: &Id) -> Result<Option<Feature>> {
        Ok(self.graph.read().features.get(id).cloned())
    }

    async fn list_features_for_model(&self, model_id: &Id) -> Result<Vec<Feature>> {
        let graph = self.graph.read();
        if !graph.models.contains_key(model_id) {
            return Err(StoreError::not_found(format!("model '{}'", model_id)));
        }
        let mut features: Vec<Feature> = graph
            .features
            .values()
            .filter(|f| {
                &f.model_id == model_id
                    || f.transitive_ancestor_model_ids
                        .as_ref()
                        .is_some_and(|ids| ids.contains(model_id))
            })
            .cloned()
            .collect();
        features.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(features)
    }

    async fn insert_feature(&self, mut feature: Feature) -> Result<Feature> {
        refuse_existing_id("feature", &feature.id)?;
        let mut graph = self.graph.write();
        let ancestors = graph.check_feature(&feature)?;

        let id = generate_id();
        feature.id = Some(id.clone());
        feature.transitive_ancestor_model_ids = Some(ancestors);
        graph.features.insert(id.clone(), feature.clone());
        info!("Created feature '{}' ({})", feature.name, id);
        Ok(feature)
    }

    async fn update_feature(&self, mut feature: Feature) -> Result<Feature> {
        let id = require_id("feature", &feature.id)?;
        let mut graph = self.graph.write();
        let created_at = graph
            .features
            .get(&id)
            .map(|existing| existing.created_at)
            .ok_or_else(|| StoreError::not_found(format!("feature '{}'", id)))?;
        let ancestors = graph.check_feature(&feature)?;

        feature.created_at = created_at;
        feature.transitive_ancestor_model_ids = Some(ancestors);
        graph.features.insert(id.clone(), feature.clone());
        debug!("Updated feature '{}' ({})", feature.name, id);
        Ok(feature)
    }
}

impl Store for MemoryStore {}
