//! Unified error types for the domain layer
//!
//! Provides a common error type usable across all domain operations, so the
//! engine never has to fall back to String or anyhow for world-model errors.

use thiserror::Error;

use crate::condition::ConditionError;
use crate::dice::DiceParseError;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Zone not found in the zone map
    #[error("Zone '{0}' not found")]
    ZoneNotFound(String),

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<DiceParseError> for DomainError {
    fn from(err: DiceParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<ConditionError> for DomainError {
    fn from(err: ConditionError) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = DomainError::validation("name cannot be empty");
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(err.to_string(), "Validation failed: name cannot be empty");
    }

    #[test]
    fn test_not_found_error() {
        let err = DomainError::not_found("Entity", "npc.guard");
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(err.to_string().contains("npc.guard"));
    }

    #[test]
    fn test_zone_not_found_error() {
        let err = DomainError::ZoneNotFound("courtyard".to_string());
        assert_eq!(err.to_string(), "Zone 'courtyard' not found");
    }

    #[test]
    fn test_from_dice_parse_error() {
        let dice_err = DiceParseError::Empty;
        let domain_err: DomainError = dice_err.into();
        assert!(matches!(domain_err, DomainError::Parse(_)));
    }
}
