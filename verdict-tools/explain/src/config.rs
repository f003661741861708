//! Policy File Configuration
//!
//! Defines the TOML policy format read by `verdict-explain`.

use serde::{Deserialize, Serialize};

/// A complete policy: types, matcher definitions, list order and the
/// outcomes to explain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Type declarations. A type may only reference types declared before it.
    pub types: Vec<TypeDecl>,

    /// Matcher definitions, in any order.
    pub matchers: Vec<MatcherDecl>,

    /// Matcher list priority. Defaults to every class in declaration order.
    pub list: Option<ListDecl>,

    /// Outcomes to explain.
    pub outcomes: Vec<OutcomeDecl>,
}

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDeclKind {
    #[default]
    Class,
    Interface,
}

/// One declared error or value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,

    #[serde(default)]
    pub kind: TypeDeclKind,

    /// Parent class, or for an interface, an extended interface.
    #[serde(default)]
    pub extends: Option<String>,

    /// Implemented (or, for interfaces, extended) interfaces.
    #[serde(default)]
    pub implements: Vec<String>,
}

/// Kind of a matcher definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherDeclKind {
    #[default]
    Class,
    Module,
}

/// One matcher definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherDecl {
    pub name: String,

    #[serde(default)]
    pub kind: MatcherDeclKind,

    /// Parent class definition.
    #[serde(default)]
    pub extends: Option<String>,

    /// Included modules, in inclusion order.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub clauses: Vec<ClauseDecl>,
}

/// One clause. `result` is a template; `{status}`, `{error}` and
/// `{value}` are replaced with the matched outcome's status and type names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseDecl {
    pub status: String,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    pub result: String,
}

/// Matcher list priority, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListDecl {
    pub order: Vec<String>,
}

/// An outcome to explain. Error and value are given by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDecl {
    pub status: String,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub value: Option<String>,
}

/// The policy printed by `verdict-explain sample`.
pub const SAMPLE_POLICY: &str = r#"# verdict-explain sample policy
#
# Types are declared in order; `extends` names a parent class and
# `implements` lists interfaces. Both must already be declared.

[[types]]
name = "StandardError"

[[types]]
name = "CustomError"
extends = "StandardError"

[[types]]
name = "Retryable"
kind = "interface"

[[types]]
name = "TimeoutError"
extends = "StandardError"
implements = ["Retryable"]

[[types]]
name = "Response"

# Modules hold clauses for classes to include. They cannot be listed.
[[matchers]]
name = "Logging"
kind = "module"

[[matchers.clauses]]
status = "failure"
result = "logged {status} ({error})"

# Within a matcher the most specific clause wins, whatever the order here.
[[matchers]]
name = "ApiMatcher"
include = ["Logging"]

[[matchers.clauses]]
status = "success"
value = "Response"
result = "render {value}"

[[matchers.clauses]]
status = "failure"
error = "CustomError"
result = "custom error"

[[matchers]]
name = "RetryMatcher"

[[matchers.clauses]]
status = "failure"
error = "Retryable"
result = "retry"

# The list tries every matcher for an exact clause, then a partial one,
# then a generic one.
[list]
order = ["ApiMatcher", "RetryMatcher"]

[[outcomes]]
status = "failure"
error = "CustomError"

[[outcomes]]
status = "failure"
error = "TimeoutError"

[[outcomes]]
status = "failure"

[[outcomes]]
status = "success"
value = "Response"

[[outcomes]]
status = "success"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_policy_parses() {
        let policy: Policy = toml::from_str(SAMPLE_POLICY).unwrap();
        assert_eq!(policy.types.len(), 5);
        assert_eq!(policy.types[2].kind, TypeDeclKind::Interface);
        assert_eq!(policy.matchers.len(), 3);
        assert_eq!(policy.matchers[0].kind, MatcherDeclKind::Module);
        assert_eq!(policy.matchers[1].include, vec!["Logging".to_string()]);
        assert_eq!(policy.matchers[1].clauses.len(), 2);
        assert_eq!(
            policy.list.map(|l| l.order),
            Some(vec!["ApiMatcher".to_string(), "RetryMatcher".to_string()])
        );
        assert_eq!(policy.outcomes.len(), 5);
    }

    #[test]
    fn test_empty_policy_uses_defaults() {
        let policy: Policy = toml::from_str("").unwrap();
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn test_clause_requires_result() {
        let text = r#"
            [[matchers]]
            name = "M"

            [[matchers.clauses]]
            status = "failure"
        "#;
        assert!(toml::from_str::<Policy>(text).is_err());
    }
}
