//! Specificity ordering of clause signatures.
//!
//! A clause is strictly more specific than another when:
//! 1. It constrains more slots (both > one > none), or
//! 2. It constrains the same slots, each of its types is the same as or a
//!    subtype of the other's, and at least one is a strict subtype.
//!
//! That relation is only a partial order: clauses constraining unrelated
//! types, or different single slots, are incomparable. Sequences are
//! therefore ordered by [`linear_order`], the stable linear extension over
//! declaration order, which is total and identical across runs.

use std::cmp::Ordering;

use crate::hierarchy::{TypeHierarchy, TypeTag};

/// Which slots a clause constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Neither error nor value is constrained.
    Untyped,
    ErrorOnly,
    ValueOnly,
    /// Both error and value are constrained.
    Typed,
}

impl Shape {
    /// Number of constrained slots.
    pub fn tier(self) -> u8 {
        match self {
            Shape::Untyped => 0,
            Shape::ErrorOnly | Shape::ValueOnly => 1,
            Shape::Typed => 2,
        }
    }
}

/// The type constraints of a clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    pub error: Option<TypeTag>,
    pub value: Option<TypeTag>,
}

impl Signature {
    pub fn new(error: Option<TypeTag>, value: Option<TypeTag>) -> Self {
        Self { error, value }
    }

    pub fn shape(&self) -> Shape {
        match (&self.error, &self.value) {
            (None, None) => Shape::Untyped,
            (Some(_), None) => Shape::ErrorOnly,
            (None, Some(_)) => Shape::ValueOnly,
            (Some(_), Some(_)) => Shape::Typed,
        }
    }

    /// Check the given error and value types against the constraints.
    ///
    /// An unconstrained slot accepts anything, including absence. A
    /// constrained slot requires a type that is the same as or a subtype
    /// of the constraint.
    pub fn accepts(
        &self,
        types: &TypeHierarchy,
        error: Option<&TypeTag>,
        value: Option<&TypeTag>,
    ) -> bool {
        slot_accepts(types, self.error.as_ref(), error)
            && slot_accepts(types, self.value.as_ref(), value)
    }
}

fn slot_accepts(
    types: &TypeHierarchy,
    expected: Option<&TypeTag>,
    actual: Option<&TypeTag>,
) -> bool {
    match (expected, actual) {
        (None, _) => true,
        (Some(expected), Some(actual)) => types.is_subtype(actual, expected),
        (Some(_), None) => false,
    }
}

/// Check if signature `a` is strictly more specific than signature `b`.
pub fn is_more_specific(types: &TypeHierarchy, a: &Signature, b: &Signature) -> bool {
    let (shape_a, shape_b) = (a.shape(), b.shape());
    if shape_a.tier() != shape_b.tier() {
        return shape_a.tier() > shape_b.tier();
    }
    // One error-only and one value-only clause are incomparable
    if shape_a != shape_b {
        return false;
    }

    let mut some_strictly = false;
    for (slot_a, slot_b) in [(&a.error, &b.error), (&a.value, &b.value)] {
        match (slot_a, slot_b) {
            (Some(ta), Some(tb)) => {
                if !types.is_subtype(ta, tb) {
                    return false;
                }
                if ta != tb {
                    some_strictly = true;
                }
            }
            (None, None) => {}
            _ => return false,
        }
    }

    some_strictly
}

/// Compare the specificity of two signatures.
///
/// Returns:
/// - Ordering::Less if `a` is more specific
/// - Ordering::Greater if `b` is more specific
/// - Ordering::Equal if they are identical or incomparable
pub fn compare_specificity(types: &TypeHierarchy, a: &Signature, b: &Signature) -> Ordering {
    match (is_more_specific(types, a, b), is_more_specific(types, b, a)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Order signatures most-specific-first, keeping declaration order among
/// clauses that do not outrank each other.
///
/// Repeatedly takes the earliest pending signature that no other pending
/// signature strictly outranks. Returns indices into `signatures`.
pub fn linear_order(types: &TypeHierarchy, signatures: &[&Signature]) -> Vec<usize> {
    let mut pending: Vec<usize> = (0..signatures.len()).collect();
    let mut order = Vec::with_capacity(signatures.len());

    while !pending.is_empty() {
        let next = pending
            .iter()
            .position(|&i| {
                !pending
                    .iter()
                    .any(|&j| j != i && is_more_specific(types, signatures[j], signatures[i]))
            })
            // The relation is a strict partial order, so a maximal element exists
            .unwrap_or(0);
        order.push(pending.remove(next));
    }

    order
}

/// Reorder `items` most-specific-first by their signatures.
pub fn linearize<T>(
    types: &TypeHierarchy,
    items: Vec<T>,
    signature: impl Fn(&T) -> &Signature,
) -> Vec<T> {
    let order = {
        let signatures: Vec<&Signature> = items.iter().map(&signature).collect();
        linear_order(types, &signatures)
    };
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}
