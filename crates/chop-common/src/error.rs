//! Error types for the ClickHouse operator
//!
//! Errors are structured with fields so the reconciler can report exactly
//! which template or descriptor field was rejected.

use thiserror::Error;

/// Main error type for synthesis operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A descriptor or template failed validation
    #[error("validation error for {subject}: {message}")]
    Validation {
        /// Name of the template or object that is invalid
        subject: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.ports[0].port")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error with subject context and field path
    pub fn validation_for_field(
        subject: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            subject: subject.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Get the subject of a validation error
    pub fn subject(&self) -> Option<&str> {
        match self {
            Error::Validation { subject, .. } => Some(subject),
            Error::Serialization { .. } => None,
        }
    }

    /// Get the offending field path, if one was recorded
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            Error::Serialization { .. } => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_template_and_field() {
        let err = Error::validation_for_field(
            "lb-template",
            "spec.ports[0].port",
            "port 0 out of range",
        );
        assert!(err.to_string().contains("lb-template"));
        assert!(err.to_string().contains("out of range"));
        assert_eq!(err.subject(), Some("lb-template"));
        assert_eq!(err.field(), Some("spec.ports[0].port"));
    }

    #[test]
    fn serialization_error_from_serde_json() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err = Error::from(parse.unwrap_err());
        assert!(err.to_string().starts_with("serialization error"));
        assert_eq!(err.subject(), None);
    }
}
