use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type Id = String;

/// Reserved separator between the kind token and the identifier of a resource key.
pub const RESOURCE_SEPARATOR: char = ':';

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Check that an identifier can be embedded in a canonical resource key.
///
/// Returns the reason the identifier is rejected, if any.
pub fn identifier_problem(identifier: &str) -> Option<&'static str> {
    if identifier.is_empty() {
        return Some("identifier is empty");
    }
    if identifier.contains(RESOURCE_SEPARATOR) {
        return Some("identifier contains the reserved separator ':'");
    }
    if identifier
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Some("identifier contains whitespace or control characters");
    }
    None
}

/// Default timestamp for records deserialized without audit fields
pub(crate) fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_identifiers() {
        for _ in 0..16 {
            assert_eq!(identifier_problem(&generate_id()), None);
        }
    }

    #[test]
    fn test_identifier_problems() {
        assert!(identifier_problem("").is_some());
        assert!(identifier_problem("a:b").is_some());
        assert!(identifier_problem("a b").is_some());
        assert!(identifier_problem("a\u{0}").is_some());
        assert_eq!(identifier_problem("model-1"), None);
    }
}
