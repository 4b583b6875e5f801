//! Validation engine
//!
//! Every collected object gets a `ValidationEntry`. Rules are looked up by
//! the object's kind and append failed checks to the entry; an object is
//! valid when no applicable rule failed.

pub mod rules;

use std::collections::BTreeSet;
use tracing::debug;

use crate::collector::CollectedState;
use crate::error::{EngineError, EngineResult};
use crate::models::{ConfigKind, ConfigRef, ObjectKey, ValidationEntry, ValidationReport};
use crate::references::{DEFAULT_CLUSTER_DOMAIN_SUFFIX, ReferenceGraph, Resolver};

/// Version of the rule set shipped by `RuleSet::default_rules`
pub const RULESET_VERSION: u32 = 1;

/// Everything a rule may look at
pub struct RuleContext<'a> {
    pub state: &'a CollectedState,
    pub graph: &'a ReferenceGraph,
    pub resolver: Resolver<'a>,
}

/// A single validation rule
pub trait Rule: Send + Sync {
    /// Stable code, e.g. `KIA1101`
    fn code(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Kinds the rule applies to
    fn kinds(&self) -> &'static [ConfigKind];
    /// Record failures for `obj` on `entry`
    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry);
}

/// Registry of rules
pub struct RuleSet {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn default_rules() -> Self {
        Self {
            rules: rules::all(),
        }
    }

    pub fn with(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Drop the rules whose code is listed in `disabled`
    pub fn without<S: AsRef<str>>(mut self, disabled: &[S]) -> Self {
        let disabled: BTreeSet<&str> = disabled.iter().map(AsRef::as_ref).collect();
        self.rules.retain(|rule| !disabled.contains(rule.code()));
        self
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.code()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn applicable(&self, kind: ConfigKind) -> impl Iterator<Item = &dyn Rule> {
        self.rules
            .iter()
            .map(|rule| rule.as_ref())
            .filter(move |rule| rule.kinds().contains(&kind))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::default_rules()
    }
}

/// Rule set bound to a cluster DNS suffix
pub struct ValidationEngine {
    rules: RuleSet,
    cluster_domain_suffix: String,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(RuleSet::default_rules(), DEFAULT_CLUSTER_DOMAIN_SUFFIX)
    }
}

impl ValidationEngine {
    pub fn new(rules: RuleSet, cluster_domain_suffix: impl Into<String>) -> Self {
        Self {
            rules,
            cluster_domain_suffix: cluster_domain_suffix.into(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn cluster_domain_suffix(&self) -> &str {
        &self.cluster_domain_suffix
    }

    /// Validate every object, or only `target` when given
    pub fn validate(
        &self,
        state: &CollectedState,
        graph: &ReferenceGraph,
        target: Option<&ObjectKey>,
    ) -> EngineResult<ValidationReport> {
        let ctx = RuleContext {
            state,
            graph,
            resolver: Resolver::new(state, &self.cluster_domain_suffix),
        };

        let objects = match target {
            Some(key) => {
                let obj = state.find(key).ok_or_else(|| EngineError::ObjectNotFound {
                    kind: key.kind,
                    namespace: key.namespace.clone(),
                    name: key.name.clone(),
                })?;
                vec![obj]
            }
            None => state.objects(),
        };

        let report: ValidationReport = objects
            .into_iter()
            .map(|obj| self.validate_object(&ctx, obj))
            .collect();

        debug!(
            entries = report.len(),
            invalid = report.invalid().count(),
            ruleset = RULESET_VERSION,
            "Validated objects"
        );
        Ok(report)
    }

    fn validate_object(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>) -> ValidationEntry {
        let mut entry = ValidationEntry::new(obj.kind(), obj.namespace(), obj.name());
        for rule in self.rules.applicable(obj.kind()) {
            rule.check(ctx, obj, &mut entry);
        }
        entry
    }
}

/// Validate with the default rule set and cluster DNS suffix
pub fn validate(
    state: &CollectedState,
    graph: &ReferenceGraph,
    target: Option<&ObjectKey>,
) -> EngineResult<ValidationReport> {
    ValidationEngine::default().validate(state, graph, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::Scope;

    #[test]
    fn test_default_rules_have_unique_codes() {
        let rules = RuleSet::default_rules();
        let codes: BTreeSet<_> = rules.codes().into_iter().collect();
        assert_eq!(codes.len(), rules.len());
        assert_eq!(rules.len(), 22);
    }

    #[test]
    fn test_disable_by_code() {
        let rules = RuleSet::default_rules().without(&["KIA1101", "KIA0004"]);
        assert_eq!(rules.len(), 20);
        assert!(!rules.codes().contains(&"KIA1101"));
    }

    #[test]
    fn test_single_object_mode_requires_object() {
        let state = CollectedState::new(Scope::Namespace("bookinfo".into()), ["bookinfo"]);
        let graph = ReferenceGraph::build(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        let key = ObjectKey::new(ConfigKind::VirtualService, "bookinfo", "invalid");

        let err = validate(&state, &graph, Some(&key)).unwrap_err();
        assert!(matches!(err, EngineError::ObjectNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }
}
