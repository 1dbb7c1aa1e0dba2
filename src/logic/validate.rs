use std::collections::{HashMap, HashSet};

use crate::error::{Result, StoreError};
use crate::model::{Feature, Model, Property, Schema, SchemaKind, ValueKind};

/// Structural checks the store runs before accepting a write.
pub struct Validator;

impl Validator {
    pub fn validate_schema(schema: &Schema) -> Result<()> {
        if schema.name.trim().is_empty() {
            return Err(StoreError::validation("schema name must not be empty"));
        }

        let mut seen = HashSet::new();
        for field in &schema.fields {
            if field.key.is_empty() {
                return Err(StoreError::validation(format!(
                    "schema '{}' declares a field with an empty key",
                    schema.name
                )));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(StoreError::validation(format!(
                    "schema '{}' declares field '{}' more than once",
                    schema.name, field.key
                )));
            }
        }

        Self::check_unique_keys(&schema.name, &schema.properties)
    }

    /// Check a model's properties against its schema and the fields it inherits.
    ///
    /// `inherited` holds the field kinds visible through the model's parents.
    /// A property must be declared by the schema or inherited; a required
    /// schema field may be satisfied by an inherited default.
    pub fn validate_model(
        model: &Model,
        schema: &Schema,
        inherited: &HashMap<String, ValueKind>,
    ) -> Result<()> {
        if model.name.trim().is_empty() {
            return Err(StoreError::validation("model name must not be empty"));
        }
        if schema.kind != SchemaKind::Model {
            return Err(StoreError::validation(format!(
                "schema '{}' is not a model schema",
                schema.name
            )));
        }
        Self::check_unique_keys(&model.name, &model.properties)?;

        for property in &model.properties {
            let declared = schema
                .get_field(property.key())
                .map(|field| field.kind)
                .or_else(|| inherited.get(property.key()).copied())
                .ok_or_else(|| {
                    StoreError::validation(format!(
                        "property '{}' of model '{}' is not declared by schema '{}' or any parent",
                        property.key(),
                        model.name,
                        schema.name
                    ))
                })?;
            Self::check_kind(&model.name, property, declared)?;
        }

        for field in schema.fields.iter().filter(|f| f.required) {
            let present = model.properties.iter().any(|p| p.key() == field.key)
                || inherited.contains_key(&field.key);
            if !present {
                return Err(StoreError::validation(format!(
                    "required property '{}' is missing from model '{}'",
                    field.key, model.name
                )));
            }
        }

        Ok(())
    }

    /// Check a feature's properties against the fields of its model lineage.
    pub fn validate_feature(feature: &Feature, fields: &HashMap<String, ValueKind>) -> Result<()> {
        if feature.name.trim().is_empty() {
            return Err(StoreError::validation("feature name must not be empty"));
        }
        Self::check_unique_keys(&feature.name, &feature.properties)?;

        for property in &feature.properties {
            let declared = fields.get(property.key()).copied().ok_or_else(|| {
                StoreError::validation(format!(
                    "property '{}' of feature '{}' is not a field of model '{}'",
                    property.key(),
                    feature.name,
                    feature.model_id
                ))
            })?;
            Self::check_kind(&feature.name, property, declared)?;
        }

        Ok(())
    }

    fn check_kind(owner: &str, property: &Property, declared: ValueKind) -> Result<()> {
        if declared.accepts(property.kind()) {
            Ok(())
        } else {
            Err(StoreError::validation(format!(
                "property '{}' of '{}' is {} but the field is {}",
                property.key(),
                owner,
                property.kind(),
                declared
            )))
        }
    }

    fn check_unique_keys(owner: &str, properties: &[Property]) -> Result<()> {
        let mut seen = HashSet::new();
        for property in properties {
            if !seen.insert(property.key()) {
                return Err(StoreError::validation(format!(
                    "property '{}' appears more than once on '{}'",
                    property.key(),
                    owner
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDef;

    fn bike_schema() -> Schema {
        Schema::new("bike-schema", SchemaKind::Model)
            .with_field(FieldDef::required("wheels", ValueKind::Long))
            .with_field(FieldDef::optional("color", ValueKind::Text))
    }

    #[test]
    fn test_model_satisfying_schema() {
        let model = Model::new("bike", "s")
            .with_property(Property::of("wheels", 2).unwrap())
            .with_property(Property::of("color", "red").unwrap());
        assert!(Validator::validate_model(&model, &bike_schema(), &HashMap::new()).is_ok());
    }

    #[test]
    fn test_required_field_may_be_inherited() {
        let model = Model::new("bike", "s");
        let inherited = HashMap::from([("wheels".to_string(), ValueKind::Integer)]);
        assert!(Validator::validate_model(&model, &bike_schema(), &inherited).is_ok());
        assert!(matches!(
            Validator::validate_model(&model, &bike_schema(), &HashMap::new()),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_model_kind_and_declaration_errors() {
        let wrong_kind =
            Model::new("bike", "s").with_property(Property::of("wheels", "two").unwrap());
        assert!(Validator::validate_model(&wrong_kind, &bike_schema(), &HashMap::new()).is_err());

        let undeclared = Model::new("bike", "s")
            .with_property(Property::of("wheels", 2).unwrap())
            .with_property(Property::of("engine", true).unwrap());
        assert!(Validator::validate_model(&undeclared, &bike_schema(), &HashMap::new()).is_err());

        let feature_schema = Schema::new("f", SchemaKind::Feature);
        let plain = Model::new("m", "s");
        assert!(Validator::validate_model(&plain, &feature_schema, &HashMap::new()).is_err());
    }

    #[test]
    fn test_feature_against_lineage_fields() {
        let fields = HashMap::from([
            ("wheels".to_string(), ValueKind::Long),
            ("color".to_string(), ValueKind::Text),
        ]);
        let ok =
            Feature::new("mine", "bike").with_property(Property::of("color", "blue").unwrap());
        assert!(Validator::validate_feature(&ok, &fields).is_ok());

        let unknown =
            Feature::new("mine", "bike").with_property(Property::of("gears", 21).unwrap());
        assert!(Validator::validate_feature(&unknown, &fields).is_err());

        let duplicate = Feature::new("mine", "bike")
            .with_property(Property::of("color", "blue").unwrap())
            .with_property(Property::of("color", "green").unwrap());
        assert!(Validator::validate_feature(&duplicate, &fields).is_err());
    }

    #[test]
    fn test_schema_rules() {
        assert!(Validator::validate_schema(&bike_schema()).is_ok());
        let duplicated = bike_schema().with_field(FieldDef::optional("color", ValueKind::Text));
        assert!(Validator::validate_schema(&duplicated).is_err());
        assert!(Validator::validate_schema(&Schema::new(" ", SchemaKind::Model)).is_err());
    }
}
