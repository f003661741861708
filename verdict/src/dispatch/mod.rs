//! Outcome dispatch.
//!
//! This module selects and invokes handlers for outcomes.
//!
//! # Algorithm Overview
//!
//! For a single [`Matcher`]:
//!
//! 1. **Normalize**: Adapt the input to an [`Outcome`](crate::Outcome)
//! 2. **Collect**: Take the definition's merged clauses for the status
//! 3. **Select**: The first clause (already most-specific-first) whose
//!    type constraints accept the outcome's error and value
//! 4. **Invoke**: Run the handler against the context or the matcher
//!
//! A [`MatcherList`] instead walks its matchers in priority order once per
//! [`Tier`] (exact, partial, generic) and hands the outcome to the first
//! matcher owning a clause of that tier that accepts it.

mod list;
mod matcher;


pub use list::{MatcherList, Selection, Tier};
pub use matcher::{MatchQuery, Matcher, Receiver};
