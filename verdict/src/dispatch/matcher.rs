//! Single-policy dispatch.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::clause::MatchClause;
use crate::error::{MatchError, Result};
use crate::hierarchy::{TypeHierarchy, TypeRef, TypeTag};
use crate::outcome::{self, AsOutcome, Outcome, Status};
use crate::table::{DefBuilder, MatcherDef};

use super::list::Tier;

/// What a handler runs against.
///
/// A matcher with a substituted context hands its handlers that context;
/// otherwise handlers receive the matcher itself.
pub enum Receiver<'a, C, R> {
    Context(&'a C),
    Matcher(&'a Matcher<C, R>),
}

impl<'a, C, R> Receiver<'a, C, R> {
    /// The substituted context, if the handler runs against one.
    pub fn context(self) -> Option<&'a C> {
        match self {
            Receiver::Context(context) => Some(context),
            Receiver::Matcher(_) => None,
        }
    }

    /// The dispatching matcher, if no context was substituted.
    pub fn matcher(self) -> Option<&'a Matcher<C, R>> {
        match self {
            Receiver::Context(_) => None,
            Receiver::Matcher(matcher) => Some(matcher),
        }
    }
}

impl<C, R> Clone for Receiver<'_, C, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, R> Copy for Receiver<'_, C, R> {}

impl<C, R> fmt::Debug for Receiver<'_, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receiver::Context(_) => f.write_str("Receiver::Context"),
            Receiver::Matcher(m) => write!(f, "Receiver::Matcher({})", m.name()),
        }
    }
}

/// A query against a matcher's clauses.
///
/// Either an outcome, or a bare status with optional type constraints.
/// The two forms are mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    outcome: Option<Outcome>,
    status: Option<String>,
    error: Option<TypeRef>,
    value: Option<TypeRef>,
}

impl MatchQuery {
    /// Query whether an outcome would be dispatched.
    pub fn outcome(outcome: Outcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..Self::default()
        }
    }

    /// Query by status and optional type details.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn error(mut self, ty: impl Into<TypeRef>) -> Self {
        self.error = Some(ty.into());
        self
    }

    pub fn value(mut self, ty: impl Into<TypeRef>) -> Self {
        self.value = Some(ty.into());
        self
    }

    /// Attach an outcome. Combined with status or types this is ambiguous.
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

/// A dispatchable matching policy: a frozen definition plus an optional
/// handler context.
pub struct Matcher<C, R> {
    def: Arc<MatcherDef<C, R>>,
    context: Option<Arc<C>>,
}

impl<C, R> Clone for Matcher<C, R> {
    fn clone(&self) -> Self {
        Self {
            def: Arc::clone(&self.def),
            context: self.context.clone(),
        }
    }
}

impl<C, R> fmt::Debug for Matcher<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("def", &self.def.name())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl<C, R> Matcher<C, R> {
    /// Create a matcher for a frozen definition.
    pub fn new(def: Arc<MatcherDef<C, R>>) -> Self {
        Self { def, context: None }
    }

    /// Build an anonymous class definition from a block and wrap it.
    pub fn build(
        name: &str,
        types: Arc<TypeHierarchy>,
        block: impl FnOnce(&mut DefBuilder<C, R>) -> Result<()>,
    ) -> Result<Self> {
        let mut builder = MatcherDef::class(name, types);
        block(&mut builder)?;
        Ok(Self::new(builder.build()))
    }

    /// A matcher sharing this one's clauses but running handlers against `context`.
    pub fn with_context(&self, context: C) -> Self {
        self.with_shared_context(Arc::new(context))
    }

    /// Like [`with_context`](Self::with_context) for an already shared context.
    pub fn with_shared_context(&self, context: Arc<C>) -> Self {
        Self {
            def: Arc::clone(&self.def),
            context: Some(context),
        }
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_deref()
    }

    pub fn definition(&self) -> &Arc<MatcherDef<C, R>> {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        self.def.types()
    }

    fn receiver(&self) -> Receiver<'_, C, R> {
        match &self.context {
            Some(context) => Receiver::Context(context.as_ref()),
            None => Receiver::Matcher(self),
        }
    }

    /// Find the clause that would handle `outcome`, without invoking it.
    pub fn select(&self, outcome: &Outcome) -> Result<&Arc<MatchClause<C, R>>> {
        let types = self.def.types();
        let selected = self
            .def
            .clauses_for(outcome.status())
            .iter()
            .find(|clause| {
                clause.matches_details(types, outcome.error_type(), outcome.value_type())
            });

        match selected {
            Some(clause) => {
                debug!(matcher = %self.def.name(), %outcome, clause = %clause, "selected clause");
                Ok(clause)
            }
            None => {
                debug!(matcher = %self.def.name(), %outcome, "no clause matches");
                Err(MatchError::NoMatchFound {
                    outcome: outcome.clone(),
                })
            }
        }
    }

    /// Dispatch an outcome to its most specific clause and return the
    /// handler's result.
    pub fn dispatch<O: AsOutcome + ?Sized>(&self, outcome: &O) -> Result<R> {
        let outcome = outcome.as_outcome()?;
        let clause = self.select(&outcome)?;
        Ok(clause.invoke(self.receiver(), &outcome))
    }

    /// Dispatch an arbitrary value, failing with `NotAnOutcome` if it
    /// cannot be adapted.
    pub fn dispatch_any<T: Any>(&self, object: &T) -> Result<R> {
        self.dispatch(&outcome::adapt(object)?)
    }

    /// Answer a [`MatchQuery`].
    pub fn matches(&self, query: MatchQuery) -> Result<bool> {
        let MatchQuery {
            outcome,
            status,
            error,
            value,
        } = query;

        if let Some(outcome) = outcome {
            let conflicting: Vec<&str> = [
                status.as_ref().map(|_| "status"),
                error.as_ref().map(|_| "error"),
                value.as_ref().map(|_| "value"),
            ]
            .into_iter()
            .flatten()
            .collect();
            if !conflicting.is_empty() {
                return Err(MatchError::AmbiguousQuery {
                    conflicting: conflicting.join(", "),
                });
            }
            return self.matches_outcome(&outcome);
        }

        let status = status.unwrap_or_default();
        let types = self.def.types();
        let error = error.map(|ty| types.resolve(&ty)).transpose()?;
        let value = value.map(|ty| types.resolve(&ty)).transpose()?;
        self.matches_details(&status, error.as_ref(), value.as_ref())
    }

    /// Whether any own or inherited clause would accept `outcome`.
    pub fn matches_outcome<O: AsOutcome + ?Sized>(&self, outcome: &O) -> Result<bool> {
        let outcome = outcome.as_outcome()?;
        let types = self.def.types();
        Ok(self
            .def
            .clauses_for(outcome.status())
            .iter()
            .any(|clause| clause.matches_result(types, &outcome)))
    }

    /// Whether any clause for `status` accepts the given type details.
    pub fn matches_details(
        &self,
        status: &str,
        error: Option<&TypeTag>,
        value: Option<&TypeTag>,
    ) -> Result<bool> {
        let status = Status::new(status)?;
        let types = self.def.types();
        Ok(self
            .def
            .clauses_for(&status)
            .iter()
            .any(|clause| clause.matches_details(types, error, value)))
    }

    /// Whether a clause of the given tier accepts `outcome`.
    pub(crate) fn has_clause_in_tier(&self, tier: Tier, outcome: &Outcome) -> bool {
        let types = self.def.types();
        self.def
            .clauses_for(outcome.status())
            .iter()
            .filter(|clause| tier.admits(clause.shape()))
            .any(|clause| clause.matches_result(types, outcome))
    }
}
