//! Error types for the behavior runtime.
//!
//! Only content errors live here. Empty query results, destroyed targets
//! and missing optional data are ordinary values, never errors.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for ruleset loading and evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A name in the ruleset does not resolve to any declared entry.
    #[error("Unresolved {category} reference '{name}'")]
    UnresolvedReference {
        /// Category searched (item, equation, order, ...).
        category: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// A name was declared twice in the same category.
    #[error("Duplicate {category} declaration '{name}'")]
    DuplicateDeclaration {
        /// Category of the duplicate.
        category: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// A node's arguments do not match its grammar.
    #[error("Malformed {family} node {kind}: {message}")]
    MalformedNode {
        /// Node family (numeric, finder, position, action).
        family: &'static str,
        /// Node kind tag.
        kind: String,
        /// What was wrong.
        message: String,
    },

    /// A placeholder for an unrecognised node kind was evaluated.
    #[error("Unknown {family} node '{kind}' evaluated")]
    UnknownNode {
        /// Node family.
        family: &'static str,
        /// The unrecognised kind tag.
        kind: String,
    },

    /// Equation references nested deeper than the configured limit.
    #[error("Equation '{equation}' exceeded recursion depth {depth}")]
    EquationRecursion {
        /// Equation being entered when the limit was hit.
        equation: String,
        /// The configured depth limit.
        depth: u32,
    },

    /// Invalid entity reference.
    #[error("Object not found: {0}")]
    ObjectNotFound(u32),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Shorthand for [`GameError::MalformedNode`].
    pub(crate) fn malformed(
        family: &'static str,
        kind: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedNode {
            family,
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}
