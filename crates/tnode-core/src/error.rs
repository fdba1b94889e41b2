//! # Error Types
//!
//! Two error families surface from rule processing:
//!
//! - [`CompilationError`] aborts a run before any resolution happens. The
//!   node's previous snapshot stays untouched.
//! - [`ResolutionError`] is recorded against a single directive, which is
//!   marked invalid. The run continues with the next directive.

use thiserror::Error;

use crate::entity::EntityType;

/// The directive list could not be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rule compilation failed: {}", join_errors(.errors))]
pub struct CompilationError {
    pub errors: Vec<String>,
}

impl CompilationError {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn single(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }
}

fn join_errors(errors: &[String]) -> String {
    errors.join("; ")
}

/// A directive could not be applied. The message is stored verbatim in the
/// directive's `matchErrors`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{entity_type} '{name}' does not exist in the catalog")]
    EntityNotFound {
        name: String,
        entity_type: EntityType,
    },

    #[error("no version of resource '{name}' satisfies range '{range}'")]
    VersionUnsatisfied { name: String, range: String },

    #[error("dependency tree of {entity_type} '{name}' is unavailable")]
    TreeUnavailable {
        name: String,
        entity_type: EntityType,
    },

    #[error("catalog unavailable while resolving '{name}': {reason}")]
    CatalogUnavailable { name: String, reason: String },

    #[error("'{name}' is neither a test resource nor a presentable of this node")]
    TargetNotFound { name: String },

    #[error("replacing '{replaced}' with '{replacer}' in '{owner}' creates a duplicate dependency")]
    DuplicateDependency {
        owner: String,
        replaced: String,
        replacer: String,
    },

    #[error("replacing '{replaced}' with '{replacer}' in '{owner}' creates a dependency cycle")]
    CycleDependency {
        owner: String,
        replaced: String,
        replacer: String,
    },

    #[error("dependency tree of '{owner}' exceeds the maximum depth of {max_depth}")]
    DepthExceeded { owner: String, max_depth: usize },

    #[error("'{name}' cannot be activated as a theme (resource type '{resource_type}')")]
    NotATheme { name: String, resource_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_lists_every_problem() {
        let err = CompilationError::new(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "rule compilation failed: first; second");
    }

    #[test]
    fn resolution_errors_name_the_offending_entity() {
        let err = ResolutionError::CycleDependency {
            owner: "A".into(),
            replaced: "C".into(),
            replacer: "A".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains("'C'"));

        let err = ResolutionError::EntityNotFound {
            name: "x/y".into(),
            entity_type: EntityType::Resource,
        };
        assert_eq!(err.to_string(), "resource 'x/y' does not exist in the catalog");
    }
}
