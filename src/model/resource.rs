use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Result, StoreError};
use crate::model::{identifier_problem, RESOURCE_SEPARATOR};

/// Closed set of lockable resource categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Model,
    ModelSchema,
    Feature,
    FeatureSchema,
    PrimitiveProperty,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Model,
        ResourceKind::ModelSchema,
        ResourceKind::Feature,
        ResourceKind::FeatureSchema,
        ResourceKind::PrimitiveProperty,
    ];

    /// Token used in the canonical key string
    pub fn token(&self) -> &'static str {
        match self {
            ResourceKind::Model => "MODEL",
            ResourceKind::ModelSchema => "MODEL_SCHEMA",
            ResourceKind::Feature => "FEATURE",
            ResourceKind::FeatureSchema => "FEATURE_SCHEMA",
            ResourceKind::PrimitiveProperty => "PRIMITIVE_PROPERTY",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Canonical, reversible identity of a lockable unit.
///
/// The canonical form is `"<KIND>:<IDENTIFIER>"`. Equality, hashing and
/// ordering all go through that string, so a `BTreeSet<ResourceKey>` iterates
/// in the lock acquisition order.
#[derive(Debug, Clone)]
pub struct ResourceKey {
    kind: ResourceKind,
    canonical: String,
}

impl ResourceKey {
    pub fn from_kind(kind: ResourceKind, identifier: &str) -> Result<Self> {
        let canonical = format!("{}{}{}", kind.token(), RESOURCE_SEPARATOR, identifier);
        if let Some(reason) = identifier_problem(identifier) {
            return Err(StoreError::MalformedResourceKey {
                key: canonical,
                reason: reason.to_string(),
            });
        }
        Ok(Self { kind, canonical })
    }

    pub fn model(id: &str) -> Result<Self> {
        Self::from_kind(ResourceKind::Model, id)
    }

    pub fn model_schema(id: &str) -> Result<Self> {
        Self::from_kind(ResourceKind::ModelSchema, id)
    }

    pub fn feature(id: &str) -> Result<Self> {
        Self::from_kind(ResourceKind::Feature, id)
    }

    pub fn feature_schema(id: &str) -> Result<Self> {
        Self::from_kind(ResourceKind::FeatureSchema, id)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        // The kind token never contains the separator, so the identifier starts
        // right after the token and separator.
        &self.canonical[self.kind.token().len() + RESOURCE_SEPARATOR.len_utf8()..]
    }

    pub fn encode(&self) -> &str {
        &self.canonical
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let malformed = |reason: &str| StoreError::MalformedResourceKey {
            key: encoded.to_string(),
            reason: reason.to_string(),
        };

        let (token, identifier) = encoded
            .split_once(RESOURCE_SEPARATOR)
            .ok_or_else(|| malformed("missing separator"))?;
        let kind = ResourceKind::from_token(token)
            .ok_or_else(|| malformed(&format!("unknown kind token '{}'", token)))?;
        if let Some(reason) = identifier_problem(identifier) {
            return Err(malformed(reason));
        }

        Ok(Self {
            kind,
            canonical: encoded.to_string(),
        })
    }

    pub fn decode_expecting(encoded: &str, expected: ResourceKind) -> Result<Self> {
        let key = Self::decode(encoded)?;
        if key.kind != expected {
            return Err(StoreError::ResourceKindMismatch {
                expected,
                found: key.kind,
            });
        }
        Ok(key)
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ResourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for ResourceKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(serde::de::Error::custom)
    }
}
