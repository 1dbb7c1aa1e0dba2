use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{default_timestamp, Entity, Id, Property, ResourceKey};

/// A template from which features inherit their fields.
///
/// The model's own properties are its field definitions: each key is a field
/// and the value is its default, which also fixes the field's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,

    pub name: String,

    /// Models this one inherits fields from
    #[serde(default)]
    pub parent_model_ids: BTreeSet<Id>,

    /// Model schema the properties must satisfy
    pub schema_id: Id,

    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Model input for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModel {
    pub name: String,
    #[serde(default)]
    pub parent_model_ids: BTreeSet<Id>,
    pub schema_id: Id,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// Model update for PUT operations; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_model_ids: Option<BTreeSet<Id>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<Id>,
    /// Replaces the entire property list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Property>>,
}

impl Model {
    pub fn new(name: impl Into<String>, schema_id: impl Into<Id>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            parent_model_ids: BTreeSet::new(),
            schema_id: schema_id.into(),
            properties: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_new(new_model: NewModel) -> Self {
        let mut model = Self::new(new_model.name, new_model.schema_id);
        model.parent_model_ids = new_model.parent_model_ids;
        model.properties = new_model.properties;
        model
    }

    pub fn with_parent(mut self, parent_id: impl Into<Id>) -> Self {
        self.parent_model_ids.insert(parent_id.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn apply_update(&mut self, update: ModelUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(parents) = update.parent_model_ids {
            self.parent_model_ids = parents;
        }
        if let Some(schema_id) = update.schema_id {
            self.schema_id = schema_id;
        }
        if let Some(properties) = update.properties {
            self.properties = properties;
        }
        self.updated_at = Utc::now();
    }
}

impl Entity for Model {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn dependency_set(&self) -> Result<BTreeSet<ResourceKey>> {
        let mut keys = self
            .parent_model_ids
            .iter()
            .map(|parent| ResourceKey::model(parent))
            .collect::<Result<BTreeSet<_>>>()?;
        keys.insert(ResourceKey::model_schema(&self.schema_id)?);
        Ok(keys)
    }

    fn self_resource(&self) -> Result<Option<ResourceKey>> {
        self.id.as_deref().map(ResourceKey::model).transpose()
    }
}
