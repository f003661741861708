//! Priority-ordered dispatch across independently authored matchers.
//!
//! List order is policy priority. Selection runs one full pass per tier,
//! so a lower-priority matcher's exact clause beats a higher-priority
//! matcher's generic one:
//!
//! ```text
//! Exact ──▶ Partial ──▶ Generic ──▶ NoMatchFound
//! ```
//!
//! Each pass stops at the first matcher with an accepting clause of that
//! tier; that matcher then dispatches the outcome with its own ordering.

use std::any::Any;

use tracing::debug;

use crate::clause::Shape;
use crate::error::{MatchError, Result};
use crate::outcome::{self, AsOutcome, Outcome};

use super::matcher::Matcher;

/// One pass of matcher-list selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Clauses constraining both error and value.
    Exact,
    /// Clauses constraining exactly one of error or value.
    Partial,
    /// Clauses constraining neither.
    Generic,
}

impl Tier {
    /// The tier tried after this one, if any.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Exact => Some(Tier::Partial),
            Tier::Partial => Some(Tier::Generic),
            Tier::Generic => None,
        }
    }

    /// Whether clauses of this shape take part in this pass.
    pub fn admits(self, shape: Shape) -> bool {
        match self {
            Tier::Exact => shape == Shape::Typed,
            Tier::Partial => matches!(shape, Shape::ErrorOnly | Shape::ValueOnly),
            Tier::Generic => shape == Shape::Untyped,
        }
    }
}

/// The matcher chosen by a list, and in which pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub tier: Tier,
    /// Position of the matcher in the list.
    pub index: usize,
}

/// An ordered collection of matchers tried most-preferred first.
pub struct MatcherList<C, R> {
    matchers: Vec<Matcher<C, R>>,
}

impl<C, R> Clone for MatcherList<C, R> {
    fn clone(&self) -> Self {
        Self {
            matchers: self.matchers.clone(),
        }
    }
}

impl<C, R> std::fmt::Debug for MatcherList<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.matchers.iter()).finish()
    }
}

impl<C, R> MatcherList<C, R> {
    pub fn new(matchers: Vec<Matcher<C, R>>) -> Self {
        Self { matchers }
    }

    pub fn matchers(&self) -> &[Matcher<C, R>] {
        &self.matchers
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Choose the matcher that would handle `outcome`.
    pub fn select(&self, outcome: &Outcome) -> Option<Selection> {
        let mut tier = Some(Tier::Exact);
        while let Some(current) = tier {
            let found = self
                .matchers
                .iter()
                .position(|matcher| matcher.has_clause_in_tier(current, outcome));
            if let Some(index) = found {
                debug!(
                    tier = ?current,
                    index,
                    matcher = %self.matchers[index].name(),
                    %outcome,
                    "matcher list selected matcher"
                );
                return Some(Selection {
                    tier: current,
                    index,
                });
            }
            debug!(tier = ?current, %outcome, "no matcher in tier");
            tier = current.next();
        }
        None
    }

    /// Dispatch `outcome` through the first matcher chosen by tiered selection.
    pub fn dispatch<O: AsOutcome + ?Sized>(&self, outcome: &O) -> Result<R> {
        let outcome = outcome.as_outcome()?;
        match self.select(&outcome) {
            Some(selection) => self.matchers[selection.index].dispatch(&outcome),
            None => Err(MatchError::NoMatchFound { outcome }),
        }
    }

    /// Dispatch an arbitrary value, failing with `NotAnOutcome` if it
    /// cannot be adapted.
    pub fn dispatch_any<T: Any>(&self, object: &T) -> Result<R> {
        self.dispatch(&outcome::adapt(object)?)
    }

    /// Whether any matcher would accept `outcome`.
    pub fn matches_outcome<O: AsOutcome + ?Sized>(&self, outcome: &O) -> Result<bool> {
        let outcome = outcome.as_outcome()?;
        Ok(self.select(&outcome).is_some())
    }
}

impl<C, R> FromIterator<Matcher<C, R>> for MatcherList<C, R> {
    fn from_iter<I: IntoIterator<Item = Matcher<C, R>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<C, R> From<Vec<Matcher<C, R>>> for MatcherList<C, R> {
    fn from(matchers: Vec<Matcher<C, R>>) -> Self {
        Self::new(matchers)
    }
}
