//! # Clause Tables and Lineage
//!
//! Every matching-capable definition owns a [`ClauseTable`]: clauses
//! grouped by status, each group kept most-specific-first.
//!
//! Definitions compose in two ways:
//!
//! - **Classes** may extend one parent class.
//! - **Modules** are included into classes or other modules.
//!
//! Clause lookup for a status merges the definition's own group with the
//! groups of every contributing definition, in lineage order:
//!
//! ```text
//! self → included modules (latest first, with their includes) → parent lineage
//! ```
//!
//! The merged sequence is re-sorted by specificity; ties keep lineage
//! order, so a definition's own clause wins over an equally specific
//! inherited one. Definitions are frozen behind `Arc` once built, so the
//! lineage and every merged sequence are computed exactly once.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::clause::specificity::linearize;
use crate::clause::{Handler, MatchClause, Pattern};
use crate::error::{MatchError, Result};
use crate::hierarchy::TypeHierarchy;
use crate::outcome::Status;

/// Clauses grouped by status, most specific first within each group.
pub struct ClauseTable<C, R> {
    owner: Arc<str>,
    types: Arc<TypeHierarchy>,
    /// Declaration order per status.
    declared: IndexMap<Status, Vec<Arc<MatchClause<C, R>>>>,
    /// Specificity order per status.
    sorted: IndexMap<Status, Vec<Arc<MatchClause<C, R>>>>,
}

impl<C, R> ClauseTable<C, R> {
    /// Create an empty table owned by the named definition.
    pub fn new(owner: impl Into<Arc<str>>, types: Arc<TypeHierarchy>) -> Self {
        Self {
            owner: owner.into(),
            types,
            declared: IndexMap::new(),
            sorted: IndexMap::new(),
        }
    }

    /// Validate and insert a clause, keeping its status group ordered.
    pub fn register(&mut self, pattern: Pattern, handler: Handler<C, R>) -> Result<()> {
        let clause = MatchClause::new(&self.types, pattern, handler, self.owner.clone())?;
        trace!(owner = %self.owner, clause = %clause, "registering clause");

        let status = clause.status().clone();
        let declared = self.declared.entry(status.clone()).or_default();
        declared.push(Arc::new(clause));
        let ordered = linearize(&self.types, declared.clone(), |c| c.signature());
        self.sorted.insert(status, ordered);
        Ok(())
    }

    /// This table's clauses for `status`, most specific first.
    pub fn clauses(&self, status: &Status) -> &[Arc<MatchClause<C, R>>] {
        self.sorted.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// This table's clauses for `status`, in registration order.
    pub fn declared(&self, status: &Status) -> &[Arc<MatchClause<C, R>>] {
        self.declared.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Statuses with at least one clause, in first-registration order.
    pub fn statuses(&self) -> impl Iterator<Item = &Status> {
        self.sorted.keys()
    }

    /// Total number of clauses.
    pub fn len(&self) -> usize {
        self.declared.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        &self.types
    }
}

impl<C, R> fmt::Debug for ClauseTable<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClauseTable")
            .field("owner", &self.owner)
            .field("clauses", &self.sorted)
            .finish()
    }
}

/// How a definition takes part in composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    /// May extend a parent class and include modules.
    Class,
    /// May only be included; may itself include other modules.
    Module,
}

/// A frozen matching-capable definition: its own clauses plus lineage.
pub struct MatcherDef<C, R> {
    name: Arc<str>,
    kind: DefKind,
    table: ClauseTable<C, R>,
    includes: Vec<Arc<MatcherDef<C, R>>>,
    parent: Option<Arc<MatcherDef<C, R>>>,
    /// Contributing definitions after `self`, in lineage order.
    lineage: Vec<Arc<MatcherDef<C, R>>>,
    /// Merged, specificity-ordered clauses per status.
    resolved: FxHashMap<Status, Vec<Arc<MatchClause<C, R>>>>,
}

impl<C, R> MatcherDef<C, R> {
    /// Start building a class definition.
    pub fn class(name: impl Into<Arc<str>>, types: Arc<TypeHierarchy>) -> DefBuilder<C, R> {
        DefBuilder::new(name.into(), DefKind::Class, types)
    }

    /// Start building a module definition.
    pub fn module(name: impl Into<Arc<str>>, types: Arc<TypeHierarchy>) -> DefBuilder<C, R> {
        DefBuilder::new(name.into(), DefKind::Module, types)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DefKind {
        self.kind
    }

    /// The clauses this definition registered itself.
    pub fn table(&self) -> &ClauseTable<C, R> {
        &self.table
    }

    pub fn parent(&self) -> Option<&Arc<MatcherDef<C, R>>> {
        self.parent.as_ref()
    }

    /// Directly included modules, in inclusion order.
    pub fn includes(&self) -> &[Arc<MatcherDef<C, R>>] {
        &self.includes
    }

    /// Contributing definitions after this one, in lineage order.
    pub fn lineage(&self) -> &[Arc<MatcherDef<C, R>>] {
        &self.lineage
    }

    /// Names of this definition and its lineage, in contribution order.
    pub fn ancestor_names(&self) -> Vec<&str> {
        std::iter::once(self.name())
            .chain(self.lineage.iter().map(|def| def.name()))
            .collect()
    }

    /// Whether `other` is this definition or contributes to it.
    pub fn inherits_from(&self, other: &MatcherDef<C, R>) -> bool {
        std::ptr::eq(self, other)
            || self
                .lineage
                .iter()
                .any(|def| std::ptr::eq(def.as_ref(), other))
    }

    /// Own and inherited clauses for `status`, most specific first.
    pub fn clauses_for(&self, status: &Status) -> &[Arc<MatchClause<C, R>>] {
        self.resolved.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every status with at least one own or inherited clause.
    pub fn statuses(&self) -> impl Iterator<Item = &Status> {
        self.resolved.keys()
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        self.table.types()
    }
}

impl<C, R> fmt::Debug for MatcherDef<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("lineage", &self.ancestor_names())
            .field("table", &self.table)
            .finish()
    }
}

/// Builder for a [`MatcherDef`]. Registration happens here, before freezing.
pub struct DefBuilder<C, R> {
    name: Arc<str>,
    kind: DefKind,
    table: ClauseTable<C, R>,
    includes: Vec<Arc<MatcherDef<C, R>>>,
    parent: Option<Arc<MatcherDef<C, R>>>,
}

impl<C, R> DefBuilder<C, R> {
    fn new(name: Arc<str>, kind: DefKind, types: Arc<TypeHierarchy>) -> Self {
        Self {
            table: ClauseTable::new(name.clone(), types),
            name,
            kind,
            includes: Vec::new(),
            parent: None,
        }
    }

    fn composition_error(&self, reason: impl Into<String>) -> MatchError {
        MatchError::InvalidComposition {
            name: self.name.to_string(),
            reason: reason.into(),
        }
    }

    fn check_same_types(&self, other: &MatcherDef<C, R>) -> Result<()> {
        if self.table.types().id() != other.types().id() {
            return Err(self.composition_error(format!(
                "`{}` is defined over a different type hierarchy",
                other.name()
            )));
        }
        Ok(())
    }

    /// Set the parent class. Only classes may extend, and only once.
    pub fn extends(&mut self, parent: &Arc<MatcherDef<C, R>>) -> Result<&mut Self> {
        if self.kind != DefKind::Class {
            return Err(self.composition_error("modules cannot extend a parent"));
        }
        if parent.kind() != DefKind::Class {
            return Err(self.composition_error(format!(
                "`{}` is a module and cannot be extended",
                parent.name()
            )));
        }
        if let Some(existing) = &self.parent {
            return Err(self.composition_error(format!(
                "already extends `{}`",
                existing.name()
            )));
        }
        self.check_same_types(parent)?;
        self.parent = Some(Arc::clone(parent));
        Ok(self)
    }

    /// Include a module's clauses. Later inclusions take precedence on ties.
    pub fn include(&mut self, module: &Arc<MatcherDef<C, R>>) -> Result<&mut Self> {
        if module.kind() != DefKind::Module {
            return Err(self.composition_error(format!(
                "`{}` is a class and cannot be included",
                module.name()
            )));
        }
        self.check_same_types(module)?;
        if !self.includes.iter().any(|m| Arc::ptr_eq(m, module)) {
            self.includes.push(Arc::clone(module));
        }
        Ok(self)
    }

    /// Register a clause on this definition.
    pub fn on(&mut self, pattern: Pattern, handler: Handler<C, R>) -> Result<&mut Self> {
        self.table.register(pattern, handler)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        self.table.types()
    }

    /// Freeze the definition, computing its lineage and merged clauses.
    pub fn build(self) -> Arc<MatcherDef<C, R>> {
        let lineage = assemble_lineage(&self.includes, self.parent.as_ref());
        trace!(
            name = %self.name,
            lineage = ?lineage.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "assembled lineage"
        );

        let resolved = merge_clauses(&self.table, &lineage);
        Arc::new(MatcherDef {
            name: self.name,
            kind: self.kind,
            table: self.table,
            includes: self.includes,
            parent: self.parent,
            lineage,
            resolved,
        })
    }
}

fn assemble_lineage<C, R>(
    includes: &[Arc<MatcherDef<C, R>>],
    parent: Option<&Arc<MatcherDef<C, R>>>,
) -> Vec<Arc<MatcherDef<C, R>>> {
    let parent_chain: Vec<Arc<MatcherDef<C, R>>> = parent
        .map(|parent| {
            std::iter::once(parent)
                .chain(parent.lineage.iter())
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let in_parent_chain =
        |def: &Arc<MatcherDef<C, R>>| parent_chain.iter().any(|seen| Arc::ptr_eq(seen, def));

    // Definitions the parent already brings keep their position behind it
    let mut lineage: Vec<Arc<MatcherDef<C, R>>> = Vec::new();
    for module in includes.iter().rev() {
        for def in std::iter::once(module).chain(module.lineage.iter()) {
            if !in_parent_chain(def) && !lineage.iter().any(|seen| Arc::ptr_eq(seen, def)) {
                lineage.push(Arc::clone(def));
            }
        }
    }
    for def in &parent_chain {
        if !lineage.iter().any(|seen| Arc::ptr_eq(seen, def)) {
            lineage.push(Arc::clone(def));
        }
    }

    lineage
}

fn merge_clauses<C, R>(
    own: &ClauseTable<C, R>,
    lineage: &[Arc<MatcherDef<C, R>>],
) -> FxHashMap<Status, Vec<Arc<MatchClause<C, R>>>> {
    let tables = std::iter::once(own).chain(lineage.iter().map(|def| &def.table));

    let mut merged: IndexMap<Status, Vec<Arc<MatchClause<C, R>>>> = IndexMap::new();
    for table in tables {
        for status in table.statuses() {
            merged
                .entry(status.clone())
                .or_default()
                .extend(table.clauses(status).iter().cloned());
        }
    }

    merged
        .into_iter()
        .map(|(status, clauses)| {
            let ordered = linearize(own.types(), clauses, |c| c.signature());
            (status, ordered)
        })
        .collect()
}
