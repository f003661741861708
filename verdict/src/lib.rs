//! # Verdict
//!
//! Matches the outcome of a computation (a status, an optional error and an
//! optional value) against registered clauses and runs the most specific
//! one.
//!
//! ## Architecture
//!
//! ```text
//! AsOutcome             ← Producer results normalized to (status, error, value)
//!     │
//! MatchClause           ← (status, error type?, value type?) + handler
//!     │
//! ClauseTable           ← Per-definition clauses, most specific first
//!     │
//! MatcherDef            ← Table + included modules + parent class (lineage)
//!     │
//! Matcher               ← Dispatch within one definition
//!     │
//! MatcherList           ← Tiered dispatch across matchers
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use verdict::{Handler, Matcher, MatchError, Outcome, Pattern, Payload, TypeHierarchy};
//!
//! let mut types = TypeHierarchy::new();
//! let custom = types.declare_class("CustomError", None)?;
//! let types = Arc::new(types);
//!
//! let matcher: Matcher<(), &str> = Matcher::build("Example", types, |m| {
//!     m.on(Pattern::failure().error(&custom), Handler::niladic(|_| "custom"))?;
//!     m.on(Pattern::failure(), Handler::niladic(|_| "generic"))?;
//!     Ok(())
//! })?;
//!
//! let failed = Outcome::failure(Some(Payload::tagged(custom)));
//! assert_eq!(matcher.dispatch(&failed)?, "custom");
//! assert_eq!(matcher.dispatch(&Outcome::failure(None))?, "generic");
//! assert!(matcher.dispatch(&Outcome::success(None)).unwrap_err().is_no_match());
//! # Ok::<(), MatchError>(())
//! ```

pub mod clause;
pub mod dispatch;
pub mod error;
pub mod hierarchy;
pub mod outcome;
pub mod table;

pub use clause::{Handler, HandlerKind, MatchClause, Pattern, Shape, Signature};
pub use dispatch::{MatchQuery, Matcher, MatcherList, Receiver, Selection, Tier};
pub use error::{MatchError, Result};
pub use hierarchy::{TypeHierarchy, TypeKind, TypeRef, TypeTag};
pub use outcome::{adapt, AsOutcome, Outcome, Payload, Status};
pub use table::{ClauseTable, DefBuilder, DefKind, MatcherDef};
