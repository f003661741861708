//! Verdict Policy Explainer
//!
//! Loads a declarative policy (types, matcher definitions, a matcher list
//! and sample outcomes), builds it with `verdict`, and reports which
//! clause and which matcher handle each outcome.
//!
//! # Example
//!
//! ```
//! use verdict_explain::{explain, Policy, SAMPLE_POLICY};
//!
//! let policy = Policy::from_toml(SAMPLE_POLICY).unwrap();
//! let report = explain(&policy).unwrap();
//! assert_eq!(report.outcomes.len(), policy.outcomes.len());
//! ```

pub mod config;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use verdict::{
    DefKind, Handler, MatchError, Matcher, MatcherDef, MatcherList, Outcome, Pattern, Payload,
    Status, Tier, TypeHierarchy, TypeTag,
};

pub use config::{
    ClauseDecl, ListDecl, MatcherDecl, MatcherDeclKind, OutcomeDecl, Policy, TypeDecl,
    TypeDeclKind, SAMPLE_POLICY,
};

/// Matchers built from a policy return their rendered result template.
pub type PolicyMatcher = Matcher<(), String>;

/// Errors raised while loading or building a policy.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to read policy `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("unknown matcher `{name}`")]
    UnknownMatcher { name: String },

    #[error("matcher `{name}` is defined more than once")]
    DuplicateMatcher { name: String },

    #[error("matcher definitions form a cycle: {cycle}")]
    CyclicMatchers { cycle: String },

    #[error("module `{name}` cannot be placed in the matcher list")]
    NotInstantiable { name: String },

    #[error(transparent)]
    Match(#[from] MatchError),
}

impl Policy {
    /// Parse a policy from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a policy file.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

const PLACEHOLDERS: [&str; 3] = ["{status}", "{error}", "{value}"];

/// Build the handler for a result template. Templates that mention the
/// outcome need it at call time; the rest are constant.
fn template_handler(template: &str) -> Handler<(), String> {
    let template = template.to_string();
    if PLACEHOLDERS.iter().any(|p| template.contains(p)) {
        Handler::with_outcome(move |_, outcome| render(&template, outcome))
    } else {
        Handler::niladic(move |_| template.clone())
    }
}

fn type_name(tag: Option<&TypeTag>) -> &str {
    tag.map(TypeTag::name).unwrap_or("none")
}

fn render(template: &str, outcome: &Outcome) -> String {
    template
        .replace("{status}", outcome.status().as_str())
        .replace("{error}", type_name(outcome.error_type()))
        .replace("{value}", type_name(outcome.value_type()))
}

fn lookup(types: &TypeHierarchy, name: &str) -> Result<TypeTag, PolicyError> {
    types
        .lookup(name)
        .cloned()
        .ok_or_else(|| PolicyError::UnknownType {
            name: name.to_string(),
        })
}

fn build_types(decls: &[TypeDecl]) -> Result<TypeHierarchy, PolicyError> {
    let mut types = TypeHierarchy::new();
    for decl in decls {
        let mut interfaces = decl
            .implements
            .iter()
            .map(|name| lookup(&types, name))
            .collect::<Result<Vec<_>, _>>()?;

        match decl.kind {
            TypeDeclKind::Class => {
                let parent = decl
                    .extends
                    .as_deref()
                    .map(|name| lookup(&types, name))
                    .transpose()?;
                let tag = types.declare_class(&decl.name, parent.as_ref())?;
                for interface in &interfaces {
                    types.implement(&tag, interface)?;
                }
            }
            TypeDeclKind::Interface => {
                if let Some(parent) = &decl.extends {
                    interfaces.insert(0, lookup(&types, parent)?);
                }
                types.declare_interface(&decl.name, &interfaces)?;
            }
        }
        debug!(name = %decl.name, kind = ?decl.kind, "declared type");
    }
    Ok(types)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Order definitions so every parent and included module precedes its users.
fn definition_order(decls: &[MatcherDecl]) -> Result<Vec<usize>, PolicyError> {
    let mut index = IndexMap::with_capacity(decls.len());
    for (i, decl) in decls.iter().enumerate() {
        if index.insert(decl.name.as_str(), i).is_some() {
            return Err(PolicyError::DuplicateMatcher {
                name: decl.name.clone(),
            });
        }
    }

    let mut marks = vec![Mark::Unvisited; decls.len()];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(decls.len());
    for i in 0..decls.len() {
        visit(i, decls, &index, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit<'a>(
    i: usize,
    decls: &'a [MatcherDecl],
    index: &IndexMap<&'a str, usize>,
    marks: &mut [Mark],
    path: &mut Vec<&'a str>,
    order: &mut Vec<usize>,
) -> Result<(), PolicyError> {
    let name = decls[i].name.as_str();
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Visiting => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(name);
            return Err(PolicyError::CyclicMatchers {
                cycle: cycle.join(" -> "),
            });
        }
        Mark::Unvisited => {}
    }

    marks[i] = Mark::Visiting;
    path.push(name);
    for dep in decls[i].extends.iter().chain(&decls[i].include) {
        let &j = index
            .get(dep.as_str())
            .ok_or_else(|| PolicyError::UnknownMatcher { name: dep.clone() })?;
        visit(j, decls, index, marks, path, order)?;
    }
    path.pop();
    marks[i] = Mark::Done;
    order.push(i);
    Ok(())
}

fn built<'a>(
    defs: &'a IndexMap<String, Arc<MatcherDef<(), String>>>,
    name: &str,
) -> Result<&'a Arc<MatcherDef<(), String>>, PolicyError> {
    defs.get(name).ok_or_else(|| PolicyError::UnknownMatcher {
        name: name.to_string(),
    })
}

/// A policy built into a type hierarchy, frozen definitions and a list.
#[derive(Debug)]
pub struct CompiledPolicy {
    types: Arc<TypeHierarchy>,
    defs: IndexMap<String, Arc<MatcherDef<(), String>>>,
    classes: Vec<String>,
    list: MatcherList<(), String>,
}

impl CompiledPolicy {
    pub fn compile(policy: &Policy) -> Result<Self, PolicyError> {
        let types = Arc::new(build_types(&policy.types)?);

        let mut defs: IndexMap<String, Arc<MatcherDef<(), String>>> = IndexMap::new();
        for i in definition_order(&policy.matchers)? {
            let decl = &policy.matchers[i];
            let mut builder = match decl.kind {
                MatcherDeclKind::Class => MatcherDef::class(decl.name.as_str(), types.clone()),
                MatcherDeclKind::Module => MatcherDef::module(decl.name.as_str(), types.clone()),
            };
            if let Some(parent) = &decl.extends {
                builder.extends(built(&defs, parent)?)?;
            }
            for module in &decl.include {
                builder.include(built(&defs, module)?)?;
            }
            for clause in &decl.clauses {
                let mut pattern = Pattern::new(clause.status.as_str());
                if let Some(error) = &clause.error {
                    pattern = pattern.error(error.as_str());
                }
                if let Some(value) = &clause.value {
                    pattern = pattern.value(value.as_str());
                }
                builder.on(pattern, template_handler(&clause.result))?;
            }
            defs.insert(decl.name.clone(), builder.build());
        }

        let classes: Vec<String> = policy
            .matchers
            .iter()
            .filter(|decl| decl.kind == MatcherDeclKind::Class)
            .map(|decl| decl.name.clone())
            .collect();

        let order = match &policy.list {
            Some(list) => list.order.clone(),
            None => classes.clone(),
        };
        let list = order
            .iter()
            .map(|name| {
                let def = defs.get(name.as_str()).ok_or_else(|| PolicyError::UnknownMatcher {
                    name: name.clone(),
                })?;
                if def.kind() != DefKind::Class {
                    return Err(PolicyError::NotInstantiable { name: name.clone() });
                }
                Ok(Matcher::new(Arc::clone(def)))
            })
            .collect::<Result<MatcherList<_, _>, PolicyError>>()?;

        info!(
            types = types.len(),
            definitions = defs.len(),
            listed = list.len(),
            "compiled policy"
        );
        Ok(Self {
            types,
            defs,
            classes,
            list,
        })
    }

    pub fn types(&self) -> &Arc<TypeHierarchy> {
        &self.types
    }

    pub fn definition(&self, name: &str) -> Option<&Arc<MatcherDef<(), String>>> {
        self.defs.get(name)
    }

    pub fn list(&self) -> &MatcherList<(), String> {
        &self.list
    }

    /// A matcher for a class definition.
    pub fn matcher(&self, name: &str) -> Option<PolicyMatcher> {
        self.definition(name).map(|def| Matcher::new(Arc::clone(def)))
    }

    /// Build the outcome an [`OutcomeDecl`] describes.
    pub fn outcome(&self, decl: &OutcomeDecl) -> Result<Outcome, PolicyError> {
        let mut outcome = Outcome::new(Status::new(&decl.status)?);
        if let Some(error) = &decl.error {
            outcome = outcome.with_error(Payload::tagged(lookup(&self.types, error)?));
        }
        if let Some(value) = &decl.value {
            outcome = outcome.with_value(Payload::tagged(lookup(&self.types, value)?));
        }
        Ok(outcome)
    }

    /// Explain how each class matcher and the matcher list handle `outcome`.
    pub fn explain(&self, outcome: &Outcome) -> OutcomeReport {
        let matchers = self
            .classes
            .iter()
            .filter_map(|name| self.matcher(name))
            .map(|matcher| MatcherVerdict::new(&matcher, outcome))
            .collect();

        let list = self.list.select(outcome).map(|selection| ListVerdict {
            tier: tier_name(selection.tier),
            matcher: self.list.matchers()[selection.index].name().to_string(),
            result: self.list.dispatch(outcome).ok(),
        });

        OutcomeReport {
            outcome: outcome.to_string(),
            matchers,
            list,
        }
    }
}

fn tier_name(tier: Tier) -> &'static str {
    match tier {
        Tier::Exact => "exact",
        Tier::Partial => "partial",
        Tier::Generic => "generic",
    }
}

/// Compile `policy` and explain every outcome it lists.
pub fn explain(policy: &Policy) -> Result<Report, PolicyError> {
    let compiled = CompiledPolicy::compile(policy)?;
    let outcomes = policy
        .outcomes
        .iter()
        .map(|decl| Ok(compiled.explain(&compiled.outcome(decl)?)))
        .collect::<Result<Vec<_>, PolicyError>>()?;
    Ok(Report { outcomes })
}

/// Explanation for every outcome of a policy.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcomes: Vec<OutcomeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeReport {
    pub outcome: String,
    pub matchers: Vec<MatcherVerdict>,
    /// `None` when no listed matcher accepts the outcome.
    pub list: Option<ListVerdict>,
}

/// How a single matcher handles an outcome.
#[derive(Debug, Clone, Serialize)]
pub struct MatcherVerdict {
    pub matcher: String,
    pub lineage: Vec<String>,
    pub clause: Option<String>,
    pub origin: Option<String>,
    pub result: Option<String>,
}

impl MatcherVerdict {
    fn new(matcher: &PolicyMatcher, outcome: &Outcome) -> Self {
        let lineage = matcher
            .definition()
            .ancestor_names()
            .into_iter()
            .map(String::from)
            .collect();
        let (clause, origin) = match matcher.select(outcome) {
            Ok(clause) => (Some(clause.to_string()), Some(clause.origin().to_string())),
            Err(_) => (None, None),
        };
        Self {
            matcher: matcher.name().to_string(),
            lineage,
            clause,
            origin,
            result: matcher.dispatch(outcome).ok(),
        }
    }
}

/// The matcher list's choice for an outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ListVerdict {
    pub tier: &'static str,
    pub matcher: String,
    pub result: Option<String>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, report) in self.outcomes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{report}")?;
        }
        Ok(())
    }
}

impl fmt::Display for OutcomeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.outcome)?;
        for verdict in &self.matchers {
            match (&verdict.clause, &verdict.result) {
                (Some(clause), Some(result)) => {
                    writeln!(f, "  {}: {} => {}", verdict.matcher, clause, result)?
                }
                _ => writeln!(f, "  {}: no match", verdict.matcher)?,
            }
        }
        match &self.list {
            Some(list) => writeln!(
                f,
                "  list: {} pass selected {} => {}",
                list.tier,
                list.matcher,
                list.result.as_deref().unwrap_or("no match")
            ),
            None => writeln!(f, "  list: no match"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use verdict::HandlerKind;

    fn sample_report() -> Report {
        explain(&Policy::from_toml(SAMPLE_POLICY).unwrap()).unwrap()
    }

    fn list_choice(report: &OutcomeReport) -> Option<(&str, &str, Option<&str>)> {
        report
            .list
            .as_ref()
            .map(|l| (l.tier, l.matcher.as_str(), l.result.as_deref()))
    }

    #[test]
    fn test_sample_policy_list_choices() {
        let report = sample_report();
        let choices: Vec<_> = report.outcomes.iter().map(list_choice).collect();

        assert_eq!(
            choices,
            vec![
                Some(("partial", "ApiMatcher", Some("custom error"))),
                Some(("partial", "RetryMatcher", Some("retry"))),
                Some(("generic", "ApiMatcher", Some("logged failure (none)"))),
                Some(("partial", "ApiMatcher", Some("render Response"))),
                None,
            ]
        );
    }

    #[test]
    fn test_sample_policy_matcher_verdicts() {
        let report = sample_report();
        let timeout = &report.outcomes[1];
        assert_eq!(timeout.outcome, "failure(error: TimeoutError, value: none)");

        let api = &timeout.matchers[0];
        assert_eq!(api.matcher, "ApiMatcher");
        assert_eq!(api.lineage, vec!["ApiMatcher", "Logging"]);
        assert_eq!(api.origin.as_deref(), Some("Logging"));
        assert_eq!(api.result.as_deref(), Some("logged failure (TimeoutError)"));

        let retry = &timeout.matchers[1];
        assert_eq!(retry.clause.as_deref(), Some("failure error: Retryable [RetryMatcher]"));
    }

    #[test]
    fn test_load_policy_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_POLICY.as_bytes()).unwrap();

        let policy = Policy::load(file.path()).unwrap();
        assert_eq!(policy.matchers.len(), 3);

        let missing = file.path().with_extension("missing");
        assert!(matches!(Policy::load(&missing), Err(PolicyError::Io { .. })));
    }

    #[test]
    fn test_templates_choose_handler_kind() {
        let policy = Policy::from_toml(SAMPLE_POLICY).unwrap();
        let compiled = CompiledPolicy::compile(&policy).unwrap();
        let api = compiled.definition("ApiMatcher").unwrap();

        let success = api.clauses_for(&Status::success());
        assert_eq!(success[0].handler_kind(), HandlerKind::TakesOutcome);
        let failure = api.clauses_for(&Status::failure());
        assert_eq!(failure[0].handler_kind(), HandlerKind::Niladic);
    }

    #[test]
    fn test_default_list_is_every_class() {
        let text = r#"
            [[matchers]]
            name = "Shared"
            kind = "module"

            [[matchers]]
            name = "First"
            include = ["Shared"]

            [[matchers]]
            name = "Second"
        "#;
        let compiled = CompiledPolicy::compile(&Policy::from_toml(text).unwrap()).unwrap();
        let names: Vec<_> = compiled.list().matchers().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_definitions_may_precede_their_parents() {
        let text = r#"
            [[matchers]]
            name = "Child"
            extends = "Parent"

            [[matchers]]
            name = "Parent"

            [[matchers.clauses]]
            status = "success"
            result = "from parent"

            [[outcomes]]
            status = "success"
        "#;
        let report = explain(&Policy::from_toml(text).unwrap()).unwrap();
        assert_eq!(
            report.outcomes[0].matchers[0].result.as_deref(),
            Some("from parent")
        );
    }

    #[test]
    fn test_policy_errors() {
        let cases: [(&str, fn(&PolicyError) -> bool); 9] = [
            (
                "[[types]]\nname = \"A\"\nextends = \"Missing\"",
                |e| matches!(e, PolicyError::UnknownType { .. }),
            ),
            (
                "[[types]]\nname = \"A\"\n[[types]]\nname = \"A\"",
                |e| matches!(e, PolicyError::Match(MatchError::DuplicateType { .. })),
            ),
            (
                "[[matchers]]\nname = \"M\"\n[[matchers.clauses]]\nstatus = \"failure\"\nerror = \"Nope\"\nresult = \"x\"",
                |e| matches!(e, PolicyError::Match(MatchError::InvalidTypeTag { .. })),
            ),
            (
                "[[matchers]]\nname = \"A\"\nextends = \"B\"\n[[matchers]]\nname = \"B\"\nextends = \"A\"",
                |e| matches!(e, PolicyError::CyclicMatchers { .. }),
            ),
            (
                "[[matchers]]\nname = \"A\"\n[[matchers]]\nname = \"A\"",
                |e| matches!(e, PolicyError::DuplicateMatcher { .. }),
            ),
            (
                "[[matchers]]\nname = \"A\"\n[list]\norder = [\"B\"]",
                |e| matches!(e, PolicyError::UnknownMatcher { .. }),
            ),
            (
                "[[matchers]]\nname = \"M\"\nkind = \"module\"\n[list]\norder = [\"M\"]",
                |e| matches!(e, PolicyError::NotInstantiable { .. }),
            ),
            (
                "[[matchers]]\nname = \"M\"\nkind = \"module\"\nextends = \"C\"\n[[matchers]]\nname = \"C\"",
                |e| matches!(e, PolicyError::Match(MatchError::InvalidComposition { .. })),
            ),
            (
                "[[outcomes]]\nstatus = \"not valid\"",
                |e| matches!(e, PolicyError::Match(MatchError::InvalidStatus { .. })),
            ),
        ];

        for (text, expected) in cases {
            let result = Policy::from_toml(text).and_then(|policy| explain(&policy));
            match result {
                Err(err) => assert!(expected(&err), "unexpected error for {text:?}: {err}"),
                Ok(_) => panic!("expected an error for {text:?}"),
            }
        }
    }

    #[test]
    fn test_cycle_message_names_the_cycle() {
        let text = "[[matchers]]\nname = \"A\"\nextends = \"B\"\n[[matchers]]\nname = \"B\"\nextends = \"A\"";
        let err = explain(&Policy::from_toml(text).unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "matcher definitions form a cycle: A -> B -> A"
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = sample_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["list"]["tier"], "partial");
        assert_eq!(json["outcomes"][4]["list"], serde_json::Value::Null);
        assert_eq!(json["outcomes"][3]["matchers"][1]["result"], serde_json::Value::Null);
    }

    #[test]
    fn test_text_report() {
        let report = sample_report();
        let text = report.outcomes[0].to_string();
        assert_eq!(
            text,
            "failure(error: CustomError, value: none)\n\
             \x20 ApiMatcher: failure error: CustomError [ApiMatcher] => custom error\n\
             \x20 RetryMatcher: no match\n\
             \x20 list: partial pass selected ApiMatcher => custom error\n"
        );
    }
}
