use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{default_timestamp, Entity, Id, Property, ResourceKey, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Model,
    Feature,
}

/// Definition of the property keys an entity must or may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub name: String,
    pub kind: SchemaKind,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Descriptive metadata about the schema itself
    #[serde(default)]
    pub properties: Vec<Property>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub required: bool,
}

/// Schema input for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchema {
    pub name: String,
    pub kind: SchemaKind,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// Schema update for PUT operations; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Property>>,
}

impl FieldDef {
    pub fn required(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
        }
    }
}

impl Schema {
    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            kind,
            fields: Vec::new(),
            properties: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_new(new_schema: NewSchema) -> Self {
        let mut schema = Self::new(new_schema.name, new_schema.kind);
        schema.fields = new_schema.fields;
        schema.properties = new_schema.properties;
        schema
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn apply_update(&mut self, update: SchemaUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(fields) = update.fields {
            self.fields = fields;
        }
        if let Some(properties) = update.properties {
            self.properties = properties;
        }
        self.updated_at = Utc::now();
    }
}

impl Entity for Schema {
    fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn dependency_set(&self) -> Result<BTreeSet<ResourceKey>> {
        Ok(BTreeSet::new())
    }

    fn self_resource(&self) -> Result<Option<ResourceKey>> {
        let Some(id) = self.id.as_deref() else {
            return Ok(None);
        };
        let key = match self.kind {
            SchemaKind::Model => ResourceKey::model_schema(id)?,
            SchemaKind::Feature => ResourceKey::feature_schema(id)?,
        };
        Ok(Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;

    #[test]
    fn test_self_resource_follows_schema_kind() {
        let mut schema = Schema::new("bike-fields", SchemaKind::Feature);
        assert!(schema.full_lock_set().unwrap().is_empty());

        schema.id = Some("s9".to_string());
        let own = schema.self_resource().unwrap().unwrap();
        assert_eq!(own.kind(), ResourceKind::FeatureSchema);

        schema.kind = SchemaKind::Model;
        assert_eq!(schema.self_resource().unwrap().unwrap().encode(), "MODEL_SCHEMA:s9");
    }

    #[test]
    fn test_field_lookup() {
        let schema = Schema::new("s", SchemaKind::Model)
            .with_field(FieldDef::required("wheels", ValueKind::Integer))
            .with_field(FieldDef::optional("color", ValueKind::Text));
        assert!(schema.get_field("wheels").unwrap().required);
        assert!(!schema.get_field("color").unwrap().required);
        assert!(schema.get_field("price").is_none());
    }
}
