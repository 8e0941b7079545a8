//! Error types for the migration system.

/// Errors that can occur while planning or running migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The dialect cannot express the requested DDL.
    #[error("Operation '{operation}' is not supported by the {dialect} dialect")]
    Unsupported {
        /// Operation label, e.g. "drop foreign key".
        operation: String,
        /// Dialect name.
        dialect: String,
    },

    /// A create operation collides with an object that already exists.
    #[error("Cannot create {kind} '{name}': it already exists")]
    SchemaConflict {
        /// Object kind, e.g. "table" or "index".
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// A statement of a migration step failed.
    #[error("Migration step '{step}' failed executing `{statement}`: {source}")]
    StepFailed {
        /// Step identifier.
        step: String,
        /// The statement that failed.
        statement: String,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// The step's SQL succeeded but recording it in the ledger did not.
    #[error("Migration step '{step}' could not be recorded in the ledger: {source}")]
    LedgerWrite {
        /// Step identifier.
        step: String,
        /// Underlying database error.
        #[source]
        source: sqlx::Error,
    },

    /// A code expression refused to produce SQL.
    #[error("Code expression in step '{step}' failed: {message}")]
    CodeExpression {
        /// Step identifier.
        step: String,
        /// Reason reported by the expression.
        message: String,
    },

    /// Any other error raised while a step was running.
    #[error("Migration step '{step}' failed: {source}")]
    InStep {
        /// Step identifier.
        step: String,
        /// The error raised by the step.
        #[source]
        source: Box<MigrateError>,
    },

    /// Reading the live schema failed.
    #[error("Introspection failed: {0}")]
    Introspection(String),

    /// Two steps share an identifier.
    #[error("Duplicate migration step '{0}'")]
    DuplicateStep(String),

    /// A step was registered in another product's plan.
    #[error("Step '{step}' belongs to product '{found}', not '{expected}'")]
    ProductMismatch {
        /// Step name.
        step: String,
        /// Product of the plan.
        expected: String,
        /// Product declared by the step.
        found: String,
    },

    /// A step version is not a valid semantic version.
    #[error("Invalid step version '{value}': {source}")]
    InvalidVersion {
        /// The offending value.
        value: String,
        /// Parse error.
        #[source]
        source: semver::Error,
    },

    /// Database error outside of step execution.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Creates an [`MigrateError::Unsupported`] error.
    pub fn unsupported(operation: impl Into<String>, dialect: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            dialect: dialect.into(),
        }
    }

    /// Attaches a step identifier unless the error already carries one.
    #[must_use]
    pub fn in_step(self, step: &str) -> Self {
        if self.step().is_some() {
            self
        } else {
            Self::InStep {
                step: step.to_string(),
                source: Box::new(self),
            }
        }
    }

    /// Returns the identifier of the failing step, when the error names one.
    #[must_use]
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. }
            | Self::LedgerWrite { step, .. }
            | Self::CodeExpression { step, .. }
            | Self::InStep { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_operation_and_dialect() {
        let err = MigrateError::unsupported("drop foreign key", "sqlite");
        assert_eq!(
            err.to_string(),
            "Operation 'drop foreign key' is not supported by the sqlite dialect"
        );
        assert!(err.step().is_none());
    }

    #[test]
    fn test_step_is_reported() {
        let err = MigrateError::LedgerWrite {
            step: "8.0.0/create_node_table".to_string(),
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(err.step(), Some("8.0.0/create_node_table"));
    }

    #[test]
    fn test_in_step_wraps_once() {
        let err = MigrateError::SchemaConflict {
            kind: "table",
            name: "node".to_string(),
        }
        .in_step("8.0.0/create_node_table")
        .in_step("ignored");
        assert_eq!(err.step(), Some("8.0.0/create_node_table"));
        assert!(matches!(err, MigrateError::InStep { .. }));
    }
}
