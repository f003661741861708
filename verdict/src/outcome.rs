//! Canonical outcomes and the adapter that produces them.
//!
//! Producers hand the engine anything implementing [`AsOutcome`]; the
//! engine only ever reads the normalized `(status, error, value)` triple
//! and never mutates it.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::{MatchError, Result};
use crate::hierarchy::TypeTag;

/// A validated status symbol such as `success` or `failure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(Arc<str>);

impl Status {
    /// Parse a status symbol. Must be non-empty and free of whitespace.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(MatchError::InvalidStatus {
                status: name.to_string(),
            });
        }
        Ok(Status(Arc::from(name)))
    }

    /// The `success` status.
    pub fn success() -> Self {
        Status(Arc::from("success"))
    }

    /// The `failure` status.
    pub fn failure() -> Self {
        Status(Arc::from("failure"))
    }

    /// The status symbol as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Status {
    type Error = MatchError;

    fn try_from(name: &str) -> Result<Self> {
        Status::new(name)
    }
}

/// A typed, shared datum carried as an outcome's error or value.
#[derive(Clone)]
pub struct Payload {
    tag: TypeTag,
    data: Arc<dyn Any + Send + Sync>,
}

impl Payload {
    /// Wrap `data` under the given type tag.
    pub fn new<T: Any + Send + Sync>(tag: TypeTag, data: T) -> Self {
        Self {
            tag,
            data: Arc::new(data),
        }
    }

    /// A payload that carries only its type.
    pub fn tagged(tag: TypeTag) -> Self {
        Self::new(tag, ())
    }

    /// The payload's type.
    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    /// Borrow the datum if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("tag", &self.tag).finish_non_exhaustive()
    }
}

/// The normalized `(status, error, value)` triple used for matching.
#[derive(Debug, Clone)]
pub struct Outcome {
    status: Status,
    error: Option<Payload>,
    value: Option<Payload>,
}

impl Outcome {
    /// An outcome with the given status and no error or value.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            error: None,
            value: None,
        }
    }

    /// A successful outcome carrying `value`.
    pub fn success(value: Option<Payload>) -> Self {
        Self {
            status: Status::success(),
            error: None,
            value,
        }
    }

    /// A failed outcome carrying `error`.
    pub fn failure(error: Option<Payload>) -> Self {
        Self {
            status: Status::failure(),
            error,
            value: None,
        }
    }

    /// Replace the error payload.
    pub fn with_error(mut self, error: Payload) -> Self {
        self.error = Some(error);
        self
    }

    /// Replace the value payload.
    pub fn with_value(mut self, value: Payload) -> Self {
        self.value = Some(value);
        self
    }

    /// The outcome's status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// The error payload, if any.
    pub fn error(&self) -> Option<&Payload> {
        self.error.as_ref()
    }

    /// The value payload, if any.
    pub fn value(&self) -> Option<&Payload> {
        self.value.as_ref()
    }

    /// Type of the error, if any.
    pub fn error_type(&self) -> Option<&TypeTag> {
        self.error.as_ref().map(Payload::tag)
    }

    /// Type of the value, if any.
    pub fn value_type(&self) -> Option<&TypeTag> {
        self.value.as_ref().map(Payload::tag)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn slot(tag: Option<&TypeTag>) -> &str {
            tag.map(TypeTag::name).unwrap_or("none")
        }
        write!(
            f,
            "{}(error: {}, value: {})",
            self.status,
            slot(self.error_type()),
            slot(self.value_type())
        )
    }
}

/// Conversion of a producer's result into the canonical outcome.
pub trait AsOutcome {
    /// Produce the outcome, or `NotAnOutcome` if it cannot be expressed as one.
    fn as_outcome(&self) -> Result<Outcome>;
}

impl AsOutcome for Outcome {
    fn as_outcome(&self) -> Result<Outcome> {
        Ok(self.clone())
    }
}

impl<T: AsOutcome + ?Sized> AsOutcome for &T {
    fn as_outcome(&self) -> Result<Outcome> {
        (**self).as_outcome()
    }
}

impl AsOutcome for std::result::Result<Payload, Payload> {
    fn as_outcome(&self) -> Result<Outcome> {
        Ok(match self {
            Ok(value) => Outcome::success(Some(value.clone())),
            Err(error) => Outcome::failure(Some(error.clone())),
        })
    }
}

impl AsOutcome for std::result::Result<Option<Payload>, Payload> {
    fn as_outcome(&self) -> Result<Outcome> {
        Ok(match self {
            Ok(value) => Outcome::success(value.clone()),
            Err(error) => Outcome::failure(Some(error.clone())),
        })
    }
}

/// Adapt an arbitrary value, failing with `NotAnOutcome` for unsupported shapes.
pub fn adapt<T: Any>(object: &T) -> Result<Outcome> {
    let any = object as &dyn Any;
    if let Some(outcome) = any.downcast_ref::<Outcome>() {
        return outcome.as_outcome();
    }
    if let Some(result) = any.downcast_ref::<std::result::Result<Payload, Payload>>() {
        return result.as_outcome();
    }
    if let Some(result) = any.downcast_ref::<std::result::Result<Option<Payload>, Payload>>() {
        return result.as_outcome();
    }
    Err(MatchError::NotAnOutcome {
        type_name: any::type_name::<T>().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::TypeHierarchy;

    #[test]
    fn test_status_validation() {
        assert_eq!(Status::new("failure").unwrap(), Status::failure());
        assert!(matches!(Status::new(""), Err(MatchError::InvalidStatus { .. })));
        assert!(matches!(
            Status::new("not ok"),
            Err(MatchError::InvalidStatus { status }) if status == "not ok"
        ));
    }

    #[test]
    fn test_result_adapter() {
        let mut types = TypeHierarchy::new();
        let error = types.declare_class("CustomError", None).unwrap();
        let string = types.declare_class("String", None).unwrap();

        let ok: std::result::Result<Payload, Payload> = Ok(Payload::new(string.clone(), "hi"));
        let outcome = ok.as_outcome().unwrap();
        assert_eq!(outcome.status(), &Status::success());
        assert_eq!(outcome.value_type(), Some(&string));
        assert_eq!(outcome.value().and_then(|v| v.downcast_ref::<&str>()), Some(&"hi"));

        let err: std::result::Result<Payload, Payload> = Err(Payload::tagged(error.clone()));
        let outcome = err.as_outcome().unwrap();
        assert_eq!(outcome.status(), &Status::failure());
        assert_eq!(outcome.error_type(), Some(&error));
        assert!(outcome.value().is_none());
    }

    #[test]
    fn test_adapt_rejects_unknown_shapes() {
        let outcome = Outcome::new(Status::success());
        assert!(adapt(&outcome).is_ok());

        let err = adapt(&42_u32).unwrap_err();
        assert!(matches!(err, MatchError::NotAnOutcome { type_name } if type_name == "u32"));
    }

    #[test]
    fn test_display() {
        let mut types = TypeHierarchy::new();
        let error = types.declare_class("CustomError", None).unwrap();
        let outcome = Outcome::failure(Some(Payload::tagged(error)));
        assert_eq!(outcome.to_string(), "failure(error: CustomError, value: none)");
    }
}
