use crate::model::ResourceKind;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors raised by the feature store core and its storage collaborator.
///
/// Key, property and locking failures are distinct variants because callers
/// react to them differently: bad input is rejected, a bad schema blocks a
/// deployment, and a lock timeout may be retried by the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed resource key '{key}': {reason}")]
    MalformedResourceKey { key: String, reason: String },

    #[error("resource kind mismatch: expected {expected}, found {found}")]
    ResourceKindMismatch {
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("unsupported value kind '{kind}' for property '{key}'")]
    UnsupportedPropertyKind { key: String, kind: String },

    #[error("invalid property: {0}")]
    InvalidProperty(String),

    #[error("unknown property value kind '{tag}'")]
    UnknownValueKind { tag: String },

    #[error("structural violation in property '{key}': {reason}")]
    StructuralViolation { key: String, reason: String },

    #[error("malformed property encoding: {0}")]
    MalformedProperty(String),

    #[error("failed to acquire locks: {reason}")]
    LockAcquisitionFailed { reason: String },

    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        StoreError::NotFound(what.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// True for errors caused by caller-supplied input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::MalformedResourceKey { .. }
                | StoreError::ResourceKindMismatch { .. }
                | StoreError::UnsupportedPropertyKind { .. }
                | StoreError::InvalidProperty(_)
                | StoreError::UnknownValueKind { .. }
                | StoreError::StructuralViolation { .. }
                | StoreError::MalformedProperty(_)
                | StoreError::Validation(_)
        )
    }
}
