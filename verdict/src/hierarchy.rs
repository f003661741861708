//! Type tags and the subtype relation used by clause predicates.
//!
//! Error and value types are not Rust types here: they are tags declared
//! in a [`TypeHierarchy`], which owns the subtype relation. A class has at
//! most one class parent and may implement any number of interfaces;
//! interfaces may extend other interfaces.
//!
//! ```text
//! StandardError          Retryable (interface)
//!      │                     │
//!      └── CustomError ──────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{MatchError, Result};

static NEXT_HIERARCHY_ID: AtomicU32 = AtomicU32::new(1);

/// The kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A concrete type with at most one class parent.
    Class,
    /// An abstract capability that classes implement.
    Interface,
}

/// A handle to a type declared in a [`TypeHierarchy`].
///
/// Equality and hashing use the owning hierarchy and the declaration
/// index; the name is carried for diagnostics only.
#[derive(Clone)]
pub struct TypeTag {
    hierarchy: u32,
    index: u32,
    name: Arc<str>,
}

impl TypeTag {
    /// The declared name of the type.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.hierarchy == other.hierarchy && self.index == other.index
    }
}

impl Eq for TypeTag {}

impl std::hash::Hash for TypeTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hierarchy.hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A reference to a type, either by tag or by declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Tag(TypeTag),
    Name(String),
}

impl From<TypeTag> for TypeRef {
    fn from(tag: TypeTag) -> Self {
        TypeRef::Tag(tag)
    }
}

impl From<&TypeTag> for TypeRef {
    fn from(tag: &TypeTag) -> Self {
        TypeRef::Tag(tag.clone())
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Name(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Name(name)
    }
}

#[derive(Debug, Clone)]
struct TypeEntry {
    tag: TypeTag,
    kind: TypeKind,
    /// Direct supertypes, class parent first.
    supers: Vec<u32>,
}

/// An arena of declared types and their direct supertypes.
///
/// Every hierarchy, including a clone, has its own identity. Tags minted by
/// one hierarchy are never accepted by another, even when the declarations
/// match.
#[derive(Debug)]
pub struct TypeHierarchy {
    id: u32,
    entries: Vec<TypeEntry>,
    by_name: FxHashMap<Arc<str>, u32>,
}

impl Clone for TypeHierarchy {
    /// Copy the declarations into a new hierarchy with a fresh identity.
    fn clone(&self) -> Self {
        let id = NEXT_HIERARCHY_ID.fetch_add(1, Ordering::Relaxed);
        let entries = self
            .entries
            .iter()
            .map(|entry| TypeEntry {
                tag: TypeTag {
                    hierarchy: id,
                    ..entry.tag.clone()
                },
                kind: entry.kind,
                supers: entry.supers.clone(),
            })
            .collect();
        Self {
            id,
            entries,
            by_name: self.by_name.clone(),
        }
    }
}

impl Default for TypeHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeHierarchy {
    /// Create an empty hierarchy with a fresh identity.
    pub fn new() -> Self {
        Self {
            id: NEXT_HIERARCHY_ID.fetch_add(1, Ordering::Relaxed),
            entries: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Declare a class, optionally extending a parent class.
    pub fn declare_class(&mut self, name: &str, parent: Option<&TypeTag>) -> Result<TypeTag> {
        let supers = match parent {
            Some(parent) => {
                let index = self.index_of(parent)?;
                if self.entries[index as usize].kind != TypeKind::Class {
                    return Err(MatchError::InvalidTypeTag {
                        name: parent.name().to_string(),
                        reason: format!("class `{name}` cannot extend an interface"),
                    });
                }
                vec![index]
            }
            None => Vec::new(),
        };
        self.declare(name, TypeKind::Class, supers)
    }

    /// Declare an interface extending zero or more interfaces.
    pub fn declare_interface(&mut self, name: &str, extends: &[TypeTag]) -> Result<TypeTag> {
        let mut supers = Vec::with_capacity(extends.len());
        for parent in extends {
            let index = self.index_of(parent)?;
            if self.entries[index as usize].kind != TypeKind::Interface {
                return Err(MatchError::InvalidTypeTag {
                    name: parent.name().to_string(),
                    reason: format!("interface `{name}` can only extend interfaces"),
                });
            }
            supers.push(index);
        }
        self.declare(name, TypeKind::Interface, supers)
    }

    /// Record that `ty` implements (or, for interfaces, extends) `interface`.
    pub fn implement(&mut self, ty: &TypeTag, interface: &TypeTag) -> Result<()> {
        let ty_index = self.index_of(ty)?;
        let iface_index = self.index_of(interface)?;
        if self.entries[iface_index as usize].kind != TypeKind::Interface {
            return Err(MatchError::InvalidTypeTag {
                name: interface.name().to_string(),
                reason: "only interfaces can be implemented".to_string(),
            });
        }
        if self.is_subtype(interface, ty) {
            return Err(MatchError::InvalidTypeTag {
                name: interface.name().to_string(),
                reason: format!("implementing it on `{}` would create a cycle", ty.name()),
            });
        }
        let supers = &mut self.entries[ty_index as usize].supers;
        if !supers.contains(&iface_index) {
            supers.push(iface_index);
        }
        Ok(())
    }

    fn declare(&mut self, name: &str, kind: TypeKind, supers: Vec<u32>) -> Result<TypeTag> {
        if name.trim().is_empty() {
            return Err(MatchError::InvalidTypeTag {
                name: name.to_string(),
                reason: "type names must be non-empty".to_string(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(MatchError::DuplicateType {
                name: name.to_string(),
            });
        }

        let name: Arc<str> = Arc::from(name);
        let index = self.entries.len() as u32;
        let tag = TypeTag {
            hierarchy: self.id,
            index,
            name: name.clone(),
        };
        self.entries.push(TypeEntry {
            tag: tag.clone(),
            kind,
            supers,
        });
        self.by_name.insert(name, index);
        Ok(tag)
    }

    fn index_of(&self, tag: &TypeTag) -> Result<u32> {
        if self.contains(tag) {
            Ok(tag.index)
        } else {
            Err(MatchError::InvalidTypeTag {
                name: tag.name().to_string(),
                reason: "the tag belongs to a different type hierarchy".to_string(),
            })
        }
    }

    /// Whether the tag was minted by this hierarchy.
    pub fn contains(&self, tag: &TypeTag) -> bool {
        tag.hierarchy == self.id && (tag.index as usize) < self.entries.len()
    }

    /// Look up a declared type by name.
    pub fn lookup(&self, name: &str) -> Option<&TypeTag> {
        self.by_name
            .get(name)
            .map(|&index| &self.entries[index as usize].tag)
    }

    /// The kind of a declared type.
    pub fn kind(&self, tag: &TypeTag) -> Option<TypeKind> {
        self.contains(tag)
            .then(|| self.entries[tag.index as usize].kind)
    }

    /// Resolve a reference to a tag of this hierarchy.
    pub fn resolve(&self, reference: &TypeRef) -> Result<TypeTag> {
        match reference {
            TypeRef::Tag(tag) => self.index_of(tag).map(|_| tag.clone()),
            TypeRef::Name(name) => {
                self.lookup(name)
                    .cloned()
                    .ok_or_else(|| MatchError::InvalidTypeTag {
                        name: name.clone(),
                        reason: "no type with this name is declared".to_string(),
                    })
            }
        }
    }

    /// Direct supertypes of a declared type.
    pub fn supertypes(&self, tag: &TypeTag) -> Vec<TypeTag> {
        if !self.contains(tag) {
            return Vec::new();
        }
        self.entries[tag.index as usize]
            .supers
            .iter()
            .map(|&index| self.entries[index as usize].tag.clone())
            .collect()
    }

    /// Check if `a` is `b` or a (transitive) subtype of `b`.
    pub fn is_subtype(&self, a: &TypeTag, b: &TypeTag) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if a.index == b.index {
            return true;
        }

        let mut visited = vec![false; self.entries.len()];
        let mut stack = vec![a.index];
        while let Some(current) = stack.pop() {
            if current == b.index {
                return true;
            }
            if std::mem::replace(&mut visited[current as usize], true) {
                continue;
            }
            stack.extend(self.entries[current as usize].supers.iter().copied());
        }
        false
    }

    /// Check if `a` is a subtype of `b` and not the same type.
    pub fn is_strict_subtype(&self, a: &TypeTag, b: &TypeTag) -> bool {
        a != b && self.is_subtype(a, b)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no types are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }
}
