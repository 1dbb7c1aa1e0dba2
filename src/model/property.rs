use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, StoreError};

/// Closed allow-list of value kinds a property may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Integer,
    Long,
    Double,
    Boolean,
}

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::Text,
        ValueKind::Integer,
        ValueKind::Long,
        ValueKind::Double,
        ValueKind::Boolean,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Double => "double",
            ValueKind::Boolean => "boolean",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether a value of `other` kind may be stored in a field declared as `self`.
    ///
    /// Integers widen to longs and doubles; nothing narrows.
    pub fn accepts(&self, other: ValueKind) -> bool {
        match (self, other) {
            (a, b) if *a == b => true,
            (ValueKind::Long, ValueKind::Integer) => true,
            (ValueKind::Double, ValueKind::Integer | ValueKind::Long) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A primitive property value. There is deliberately no variant for nested
/// or composite values.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Text(_) => ValueKind::Text,
            PropertyValue::Integer(_) => ValueKind::Integer,
            PropertyValue::Long(_) => ValueKind::Long,
            PropertyValue::Double(_) => ValueKind::Double,
            PropertyValue::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Text(s) => Value::String(s.clone()),
            PropertyValue::Integer(i) => Value::from(*i),
            PropertyValue::Long(l) => Value::from(*l),
            // Non-finite doubles are refused at construction, so this never yields null
            PropertyValue::Double(d) => Value::from(*d),
            PropertyValue::Boolean(b) => Value::Bool(*b),
        }
    }

    /// Read a scalar according to an already-validated kind tag.
    fn from_tagged_json(kind: ValueKind, value: &Value) -> Option<Self> {
        match kind {
            ValueKind::Text => value.as_str().map(|s| PropertyValue::Text(s.to_string())),
            ValueKind::Integer => value
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(PropertyValue::Integer),
            ValueKind::Long => value.as_i64().map(PropertyValue::Long),
            ValueKind::Double => value.as_f64().map(PropertyValue::Double),
            ValueKind::Boolean => value.as_bool().map(PropertyValue::Boolean),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// Typed key/value pair attached to an entity.
///
/// Fields are private: every `Property` in existence went through `of`,
/// `from_json` or `decode`, so its value is always one of the allowed kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    key: String,
    value: PropertyValue,
}

/// Wire form of a property: the value travels next to its kind tag.
#[derive(Debug, Serialize)]
struct EncodedProperty<'a> {
    key: &'a str,
    kind: &'static str,
    value: Value,
}

impl Property {
    pub fn of(key: impl Into<String>, value: impl Into<PropertyValue>) -> Result<Self> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(StoreError::InvalidProperty(
                "property key must not be empty".to_string(),
            ));
        }
        if let PropertyValue::Double(d) = value {
            if !d.is_finite() {
                return Err(StoreError::UnsupportedPropertyKind {
                    key,
                    kind: "non-finite double".to_string(),
                });
            }
        }
        Ok(Self { key, value })
    }

    /// Build a property from an untyped JSON value, inferring its kind.
    ///
    /// Whole numbers become `integer` when they fit in 32 bits and `long`
    /// otherwise. Objects, arrays and null are refused.
    pub fn from_json(key: impl Into<String>, value: Value) -> Result<Self> {
        let key = key.into();
        let unsupported = |key: String, kind: &str| StoreError::UnsupportedPropertyKind {
            key,
            kind: kind.to_string(),
        };

        let value = match value {
            Value::String(s) => PropertyValue::Text(s),
            Value::Bool(b) => PropertyValue::Boolean(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => PropertyValue::Integer(small),
                        Err(_) => PropertyValue::Long(i),
                    }
                } else if n.is_u64() {
                    return Err(unsupported(key, "unsigned 64-bit integer"));
                } else {
                    match n.as_f64() {
                        Some(d) => PropertyValue::Double(d),
                        None => return Err(unsupported(key, "number")),
                    }
                }
            }
            Value::Object(_) => return Err(unsupported(key, "object")),
            Value::Array(_) => return Err(unsupported(key, "array")),
            Value::Null => return Err(unsupported(key, "null")),
        };

        Self::of(key, value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    fn to_encoded(&self) -> EncodedProperty<'_> {
        EncodedProperty {
            key: &self.key,
            kind: self.value.kind().tag(),
            value: self.value.to_json(),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of a str, a static str and a scalar JSON value
        // cannot fail.
        serde_json::to_string(&self.to_encoded()).unwrap_or_default()
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(encoded)
            .map_err(|e| StoreError::MalformedProperty(e.to_string()))?;
        Self::decode_value(raw)
    }

    /// Decode the wire form from an already-parsed JSON value.
    pub fn decode_value(raw: Value) -> Result<Self> {
        let Value::Object(mut fields) = raw else {
            return Err(StoreError::MalformedProperty(
                "encoded property must be an object".to_string(),
            ));
        };

        let key = match fields.remove("key") {
            Some(Value::String(key)) => key,
            _ => {
                return Err(StoreError::MalformedProperty(
                    "missing string field 'key'".to_string(),
                ))
            }
        };
        let tag = match fields.remove("kind") {
            Some(Value::String(tag)) => tag,
            _ => {
                return Err(StoreError::MalformedProperty(format!(
                    "property '{}' is missing string field 'kind'",
                    key
                )))
            }
        };
        let value = fields.remove("value").ok_or_else(|| {
            StoreError::MalformedProperty(format!("property '{}' is missing field 'value'", key))
        })?;
        if let Some(extra) = fields.keys().next() {
            return Err(StoreError::MalformedProperty(format!(
                "property '{}' has unexpected field '{}'",
                key, extra
            )));
        }

        let kind = ValueKind::from_tag(&tag).ok_or(StoreError::UnknownValueKind { tag })?;

        if value.is_object() || value.is_array() {
            return Err(StoreError::StructuralViolation {
                key,
                reason: format!("a {} value cannot contain nested structure", kind),
            });
        }

        let decoded = PropertyValue::from_tagged_json(kind, &value).ok_or_else(|| {
            StoreError::MalformedProperty(format!(
                "property '{}' value {} is not a valid {}",
                key, value, kind
            ))
        })?;

        Self::of(key, decoded)
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_encoded().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Property {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::decode_value(raw).map_err(serde::de::Error::custom)
    }
}

/// Find a property by key in an ordered property list.
pub fn find_property<'a>(properties: &'a [Property], key: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.key() == key)
}
