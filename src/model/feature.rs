use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{default_timestamp, Entity, Id, Property, ResourceKey};

/// A concrete instance built from a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    pub name: String,

    pub model_id: Id,

    #[serde(default)]
    pub properties: Vec<Property>,

    /// Every model reachable through `model_id` and its parents.
    ///
    /// Filled in by storage after the feature is persisted and only used for
    /// lookups; it never takes part in locking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitive_ancestor_model_ids: Option<BTreeSet<Id>>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Feature input for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeature {
    pub name: String,
    pub model_id: Id,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// Feature update for PUT operations; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Property>>,
}

impl Feature {
    pub fn new(name: impl Into<String>, model_id: impl Into<Id>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            model_id: model_id.into(),
            properties: Vec::new(),
            transitive_ancestor_model_ids: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_new(new_feature: NewFeature) -> Self {
        let mut feature = Self::new(new_feature.name, new_feature.model_id);
        feature.properties = new_feature.properties;
        feature
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn apply_update(&mut self, update: FeatureUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(model_id) = update.model_id {
            if model_id != self.model_id {
                // Ancestry is recomputed by storage for the new model
                self.transitive_ancestor_model_ids = None;
            }
            self.model_id = model_id;
        }
        if let Some(properties) = update.properties {
            self.properties = properties;
        }
        self.updated_at = Utc::now();
    }
}

impl Entity for Feature {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn dependency_set(&self) -> Result<BTreeSet<ResourceKey>> {
        Ok(BTreeSet::from([ResourceKey::model(&self.model_id)?]))
    }

    fn self_resource(&self) -> Result<Option<ResourceKey>> {
        self.id.as_deref().map(ResourceKey::feature).transpose()
    }
}
