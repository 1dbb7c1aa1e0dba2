use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{Feature, Id, Model, Property, ResourceKey, Schema};

/// Capabilities every persisted graph object provides to the locking protocol.
pub trait Entity: Send + Sync {
    /// Identifier assigned by storage; `None` until first persisted
    fn id(&self) -> Option<&Id>;

    fn properties(&self) -> &[Property];

    /// Resources this entity structurally points to (parents, schemas).
    ///
    /// Never includes the entity itself, resources that merely reference it,
    /// or cached convenience data.
    fn dependency_set(&self) -> Result<BTreeSet<ResourceKey>>;

    /// This entity's own resource, available once it has an id
    fn self_resource(&self) -> Result<Option<ResourceKey>>;

    /// Everything a mutation of this entity must hold.
    ///
    /// A new entity has no resource of its own to protect, so only its
    /// dependencies are locked. An existing one also serializes against
    /// concurrent updates to itself.
    fn full_lock_set(&self) -> Result<BTreeSet<ResourceKey>> {
        let mut keys = self.dependency_set()?;
        if let Some(own) = self.self_resource()? {
            keys.insert(own);
        }
        Ok(keys)
    }
}

/// Tagged union over the concrete entity kinds, for callers that need to
/// dispatch on the kind explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum AnyEntity {
    Schema(Schema),
    Model(Model),
    Feature(Feature),
}

impl AnyEntity {
    fn inner(&self) -> &dyn Entity {
        match self {
            AnyEntity::Schema(schema) => schema,
            AnyEntity::Model(model) => model,
            AnyEntity::Feature(feature) => feature,
        }
    }
}

impl Entity for AnyEntity {
    fn id(&self) -> Option<&Id> {
        self.inner().id()
    }

    fn properties(&self) -> &[Property] {
        self.inner().properties()
    }

    fn dependency_set(&self) -> Result<BTreeSet<ResourceKey>> {
        self.inner().dependency_set()
    }

    fn self_resource(&self) -> Result<Option<ResourceKey>> {
        self.inner().self_resource()
    }
}

impl From<Schema> for AnyEntity {
    fn from(schema: Schema) -> Self {
        AnyEntity::Schema(schema)
    }
}

impl From<Model> for AnyEntity {
    fn from(model: Model) -> Self {
        AnyEntity::Model(model)
    }
}

impl From<Feature> for AnyEntity {
    fn from(feature: Feature) -> Self {
        AnyEntity::Feature(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaKind;

    #[test]
    fn test_any_entity_dispatches_to_variant() {
        let mut model = Model::new("bike", "s1");
        model.parent_model_ids.insert("vehicle".to_string());
        let any = AnyEntity::from(model.clone());
        assert_eq!(any.dependency_set().unwrap(), model.dependency_set().unwrap());
        assert!(any.self_resource().unwrap().is_none());

        let mut schema = Schema::new("bike-schema", SchemaKind::Model);
        schema.id = Some("s1".to_string());
        let any = AnyEntity::from(schema);
        assert!(any.dependency_set().unwrap().is_empty());
        assert_eq!(
            any.full_lock_set().unwrap().into_iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            vec!["MODEL_SCHEMA:s1".to_string()]
        );
    }

    #[test]
    fn test_any_entity_serde_tag() {
        let feature = Feature::new("f", "m1");
        let json = serde_json::to_value(AnyEntity::from(feature.clone())).unwrap();
        assert_eq!(json["entity"], "feature");
        let back: AnyEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, AnyEntity::Feature(feature));
    }
}
