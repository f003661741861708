//! Error types for clause registration and outcome dispatch.

use thiserror::Error;

use crate::outcome::Outcome;

/// Result type alias for matching operations.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors surfaced by the matching engine.
///
/// Registration errors (`InvalidStatus`, `InvalidTypeTag`, `DuplicateType`,
/// `InvalidComposition`) are programmer errors and are reported at the
/// point of registration. `NoMatchFound` is the expected miss case for
/// dispatch and carries the rejected outcome.
#[derive(Error, Debug, Clone)]
pub enum MatchError {
    /// A status symbol was empty or contained whitespace.
    #[error("invalid status {status:?}: a status must be a non-empty symbol")]
    InvalidStatus { status: String },

    /// A type reference does not name a type of the clause's hierarchy.
    #[error("invalid type tag `{name}`: {reason}")]
    InvalidTypeTag { name: String, reason: String },

    /// A type name was declared twice in the same hierarchy.
    #[error("type `{name}` is already declared")]
    DuplicateType { name: String },

    /// Definitions were composed in a way the lineage model does not allow.
    #[error("invalid composition of `{name}`: {reason}")]
    InvalidComposition { name: String, reason: String },

    /// The object cannot be adapted to an outcome.
    #[error("value of type `{type_name}` cannot be adapted to an outcome")]
    NotAnOutcome { type_name: String },

    /// An outcome query was combined with explicit status or type arguments.
    #[error("ambiguous match query: an outcome cannot be combined with {conflicting}")]
    AmbiguousQuery { conflicting: String },

    /// No clause (or no matcher) accepts the outcome.
    #[error("no match found for {outcome}")]
    NoMatchFound { outcome: Outcome },
}

impl MatchError {
    /// Returns true if this is the dispatch miss case.
    pub fn is_no_match(&self) -> bool {
        matches!(self, MatchError::NoMatchFound { .. })
    }

    /// The rejected outcome, if this is a dispatch miss.
    pub fn rejected_outcome(&self) -> Option<&Outcome> {
        match self {
            MatchError::NoMatchFound { outcome } => Some(outcome),
            _ => None,
        }
    }
}
