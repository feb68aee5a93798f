// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway error taxonomy.

use thiserror::Error;

use crate::batch::sdf::SdfError;
use crate::engine::EngineError;

/// One or more violated naming/typing constraints, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl ValidationError {
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            violations: vec![message.into()],
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.violations.len();
        write!(
            f,
            "{} validation error{} detected: {}",
            count,
            if count == 1 { "" } else { "s" },
            self.violations.join("; ")
        )
    }
}

/// Phase a field migration reached before failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Live,
    Dumped,
    Removed,
    Recreated,
    Reloaded,
}

impl MigrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Live => "live",
            MigrationPhase::Dumped => "dumped",
            MigrationPhase::Removed => "removed",
            MigrationPhase::Recreated => "recreated",
            MigrationPhase::Reloaded => "reloaded",
        }
    }
}

impl std::fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(ValidationError),

    #[error("{0}")]
    FieldOptionConflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("domain already exists: {0}")]
    DomainExists(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Unknown fields referenced by a document batch.
    #[error("{}", describe_unknown_fields(.unknown_fields))]
    DocumentValidation { unknown_fields: Vec<String> },

    /// Engine failure in the middle of a migration. State is left as reached.
    #[error("migration of field '{field}' failed after phase {phase}: {source}")]
    Migration {
        field: String,
        phase: MigrationPhase,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Sdf(#[from] SdfError),
}

fn describe_unknown_fields(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("undefined field: {}", f))
        .collect::<Vec<_>>()
        .join(", ")
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(ValidationError::single(message))
    }
}

impl From<ValidationError> for GatewayError {
    fn from(err: ValidationError) -> Self {
        GatewayError::Validation(err)
    }
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_aggregates() {
        let err = ValidationError {
            violations: vec!["first".into(), "second".into()],
        };
        assert_eq!(err.to_string(), "2 validation errors detected: first; second");
        assert_eq!(ValidationError::single("x").to_string(), "1 validation error detected: x");
    }

    #[test]
    fn test_document_validation_lists_every_field() {
        let err = GatewayError::DocumentValidation {
            unknown_fields: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(err.to_string(), "undefined field: foo, undefined field: bar");
    }

    #[test]
    fn test_migration_reports_phase() {
        let err = GatewayError::Migration {
            field: "age".into(),
            phase: MigrationPhase::Removed,
            source: EngineError::Transport("connection reset".into()),
        };
        assert!(err.to_string().contains("after phase removed"));
    }
}
