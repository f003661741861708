//! Match clauses: a status/type predicate paired with a handler.
//!
//! ## Module Structure
//!
//! - [`specificity`] - Shape tiers, the strictly-more-specific relation and
//!   the stable linear order used to sort clause sequences

pub mod specificity;

use std::fmt;
use std::sync::Arc;

use crate::dispatch::Receiver;
use crate::error::Result;
use crate::hierarchy::{TypeHierarchy, TypeRef, TypeTag};
use crate::outcome::{Outcome, Status};

pub use specificity::{Shape, Signature};

type NiladicFn<C, R> = dyn Fn(Receiver<'_, C, R>) -> R;
type OutcomeFn<C, R> = dyn Fn(Receiver<'_, C, R>, &Outcome) -> R;

/// Whether a handler receives the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Called with the receiver only.
    Niladic,
    /// Called with the receiver and the matched outcome.
    TakesOutcome,
}

/// A clause body. The arity is fixed when the handler is built.
pub enum Handler<C, R> {
    Niladic(Arc<NiladicFn<C, R>>),
    TakesOutcome(Arc<OutcomeFn<C, R>>),
}

impl<C, R> Handler<C, R> {
    /// A handler that ignores the outcome.
    pub fn niladic(body: impl Fn(Receiver<'_, C, R>) -> R + 'static) -> Self {
        Handler::Niladic(Arc::new(body))
    }

    /// A handler that receives the matched outcome.
    pub fn with_outcome(body: impl Fn(Receiver<'_, C, R>, &Outcome) -> R + 'static) -> Self {
        Handler::TakesOutcome(Arc::new(body))
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Niladic(_) => HandlerKind::Niladic,
            Handler::TakesOutcome(_) => HandlerKind::TakesOutcome,
        }
    }

    pub(crate) fn call(&self, receiver: Receiver<'_, C, R>, outcome: &Outcome) -> R {
        match self {
            Handler::Niladic(body) => body(receiver),
            Handler::TakesOutcome(body) => body(receiver, outcome),
        }
    }
}

impl<C, R> Clone for Handler<C, R> {
    fn clone(&self) -> Self {
        match self {
            Handler::Niladic(body) => Handler::Niladic(Arc::clone(body)),
            Handler::TakesOutcome(body) => Handler::TakesOutcome(Arc::clone(body)),
        }
    }
}

impl<C, R> fmt::Debug for Handler<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

/// An unvalidated clause predicate, as written at a registration site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    status: String,
    error: Option<TypeRef>,
    value: Option<TypeRef>,
}

impl Pattern {
    /// A pattern for `status` with no type constraints.
    ///
    /// The status is validated when the clause is registered.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            error: None,
            value: None,
        }
    }

    /// Match `success` outcomes.
    pub fn success() -> Self {
        Self::new("success")
    }

    /// Match `failure` outcomes.
    pub fn failure() -> Self {
        Self::new("failure")
    }

    /// Require the outcome's error to be this type or a subtype.
    pub fn error(mut self, ty: impl Into<TypeRef>) -> Self {
        self.error = Some(ty.into());
        self
    }

    /// Require the outcome's value to be this type or a subtype.
    pub fn value(mut self, ty: impl Into<TypeRef>) -> Self {
        self.value = Some(ty.into());
        self
    }

    /// The status as written, before validation.
    pub fn status(&self) -> &str {
        &self.status
    }
}

/// An immutable registered clause.
pub struct MatchClause<C, R> {
    status: Status,
    signature: Signature,
    handler: Handler<C, R>,
    origin: Arc<str>,
}

impl<C, R> MatchClause<C, R> {
    /// Validate `pattern` against `types` and build a clause.
    ///
    /// Fails with `InvalidStatus` for a malformed status and
    /// `InvalidTypeTag` for type references the hierarchy does not know.
    pub fn new(
        types: &TypeHierarchy,
        pattern: Pattern,
        handler: Handler<C, R>,
        origin: Arc<str>,
    ) -> Result<Self> {
        let status = Status::new(&pattern.status)?;
        let error = pattern.error.map(|ty| types.resolve(&ty)).transpose()?;
        let value = pattern.value.map(|ty| types.resolve(&ty)).transpose()?;
        Ok(Self {
            status,
            signature: Signature::new(error, value),
            handler,
            origin,
        })
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn error_type(&self) -> Option<&TypeTag> {
        self.signature.error.as_ref()
    }

    pub fn value_type(&self) -> Option<&TypeTag> {
        self.signature.value.as_ref()
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn shape(&self) -> Shape {
        self.signature.shape()
    }

    pub fn handler_kind(&self) -> HandlerKind {
        self.handler.kind()
    }

    /// Name of the definition that registered this clause.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Check error and value types against this clause's constraints.
    pub fn matches_details(
        &self,
        types: &TypeHierarchy,
        error: Option<&TypeTag>,
        value: Option<&TypeTag>,
    ) -> bool {
        self.signature.accepts(types, error, value)
    }

    /// Check status, error type and value type of an outcome.
    pub fn matches_result(&self, types: &TypeHierarchy, outcome: &Outcome) -> bool {
        self.status == *outcome.status()
            && self.matches_details(types, outcome.error_type(), outcome.value_type())
    }

    pub(crate) fn invoke(&self, receiver: Receiver<'_, C, R>, outcome: &Outcome) -> R {
        self.handler.call(receiver, outcome)
    }
}

impl<C, R> fmt::Debug for MatchClause<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchClause")
            .field("status", &self.status)
            .field("error", &self.signature.error)
            .field("value", &self.signature.value)
            .field("handler", &self.handler.kind())
            .field("origin", &self.origin)
            .finish()
    }
}

impl<C, R> fmt::Display for MatchClause<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(error) = &self.signature.error {
            write!(f, " error: {error}")?;
        }
        if let Some(value) = &self.signature.value {
            write!(f, " value: {value}")?;
        }
        write!(f, " [{}]", self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Payload;

    fn clause(types: &TypeHierarchy, pattern: Pattern) -> Result<MatchClause<(), &'static str>> {
        MatchClause::new(types, pattern, Handler::niladic(|_| "ok"), Arc::from("Test"))
    }

    #[test]
    fn test_clause_validation() {
        let mut types = TypeHierarchy::new();
        types.declare_class("CustomError", None).unwrap();

        assert!(clause(&types, Pattern::failure().error("CustomError")).is_ok());
        assert!(matches!(
            clause(&types, Pattern::new("")),
            Err(crate::MatchError::InvalidStatus { .. })
        ));
        assert!(matches!(
            clause(&types, Pattern::failure().value("Missing")),
            Err(crate::MatchError::InvalidTypeTag { .. })
        ));
    }

    #[test]
    fn test_matches_result_requires_status() {
        let mut types = TypeHierarchy::new();
        let custom = types.declare_class("CustomError", None).unwrap();
        let c = clause(&types, Pattern::failure().error(&custom)).unwrap();

        let failure = Outcome::failure(Some(Payload::tagged(custom.clone())));
        let success = Outcome::success(None).with_error(Payload::tagged(custom));
        assert!(c.matches_result(&types, &failure));
        assert!(!c.matches_result(&types, &success));
        assert!(!c.matches_result(&types, &Outcome::failure(None)));
    }

    #[test]
    fn test_handler_kind() {
        let niladic: Handler<(), u8> = Handler::niladic(|_| 1);
        let takes: Handler<(), u8> = Handler::with_outcome(|_, _| 2);
        assert_eq!(niladic.kind(), HandlerKind::Niladic);
        assert_eq!(takes.kind(), HandlerKind::TakesOutcome);
    }

    #[test]
    fn test_display() {
        let mut types = TypeHierarchy::new();
        let custom = types.declare_class("CustomError", None).unwrap();
        let c = clause(&types, Pattern::failure().error(&custom)).unwrap();
        assert_eq!(c.to_string(), "failure error: CustomError [Test]");
    }
}
