//! Error taxonomy shared by the planning modules.
//!
//! Every failure surfaces synchronously, before any resource is declared,
//! and names the field, the offending value and the violated constraint.

use crate::ip::block::CidrError;

/// Errors raised while validating configuration or synthesizing a topology
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthError {
    /// Malformed or out-of-range input
    #[error("Invalid value for `{field}`: '{value}' ({constraint})")]
    Validation {
        field: String,
        value: String,
        constraint: String,
    },

    /// Individually valid inputs that contradict each other
    #[error("Inconsistent configuration in {context}: {reason}")]
    Configuration { context: String, reason: String },

    /// Reference to something that was never declared
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
}

impl SynthError {
    pub fn validation(
        field: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        SynthError::Validation {
            field: field.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    pub fn configuration(context: impl Into<String>, reason: impl Into<String>) -> Self {
        SynthError::Configuration {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        SynthError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Wrap a CIDR failure with the field it came from
    pub fn from_cidr(field: impl Into<String>, value: &str, err: CidrError) -> Self {
        SynthError::validation(field, value, err.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SynthError::Validation { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SynthError::Configuration { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SynthError::NotFound { .. })
    }
}
