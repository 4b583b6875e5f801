use super::{siblings, workload_selector};
use crate::models::{Check, ConfigKind, ConfigRef, RefKey, ValidationEntry};
use crate::references::extract::subset_namespace;
use crate::references::Relation;
use crate::validation::{Rule, RuleContext};

/// KIA0004: a workload selector must match at least one workload
pub struct WorkloadSelectorMatch;

impl Rule for WorkloadSelectorMatch {
    fn code(&self) -> &'static str {
        "KIA0004"
    }

    fn description(&self) -> &'static str {
        "Workload selectors must match a workload"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[
            ConfigKind::AuthorizationPolicy,
            ConfigKind::PeerAuthentication,
            ConfigKind::RequestAuthentication,
            ConfigKind::Sidecar,
            ConfigKind::Gateway,
            ConfigKind::EnvoyFilter,
        ]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let Some((labels, path)) = workload_selector(obj) else {
            return;
        };
        // Gateway selectors pick ingress pods anywhere in the cluster
        let namespace = match obj.kind() {
            ConfigKind::Gateway => None,
            _ => Some(obj.namespace()),
        };
        let no_match = ctx
            .resolver
            .workloads(namespace, labels)
            .is_some_and(|matched| matched.is_empty());
        if no_match {
            let message = match namespace {
                Some(_) => "No matching workload found for the selector in this namespace",
                None => "No matching workload found for gateway selector",
            };
            entry.fail(Check::warning(self.code(), message, path), Vec::new());
        }
    }
}

/// KIA0002: one namespace-wide (selector-less) object per namespace
pub struct NamespaceWideUniqueness;

impl Rule for NamespaceWideUniqueness {
    fn code(&self) -> &'static str {
        "KIA0002"
    }

    fn description(&self) -> &'static str {
        "At most one namespace-wide object per kind and namespace"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[
            ConfigKind::PeerAuthentication,
            ConfigKind::RequestAuthentication,
            ConfigKind::Sidecar,
        ]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        if workload_selector(obj).is_some() {
            return;
        }
        let others: Vec<RefKey> = siblings(ctx, obj)
            .into_iter()
            .filter(|other| workload_selector(*other).is_none())
            .map(|other| other.key().into())
            .collect();
        if others.is_empty() {
            return;
        }
        let path = match obj.kind() {
            ConfigKind::Sidecar => "spec/workloadSelector",
            _ => "spec/selector",
        };
        let message = format!(
            "More than one {} without a selector in the same namespace",
            obj.kind().kind_str()
        );
        entry.fail(Check::error(self.code(), message, path), others);
    }
}

/// KIA0203: subset labels must select at least one workload of the host
pub struct SubsetLabels;

impl Rule for SubsetLabels {
    fn code(&self) -> &'static str {
        "KIA0203"
    }

    fn description(&self) -> &'static str {
        "Destination rule subsets must match a workload"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::DestinationRule]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::DestinationRule(dr) = obj else {
            return;
        };
        let target_ns = subset_namespace(&ctx.resolver, &dr.spec.host, obj.namespace());
        for (i, subset) in dr.spec.subsets.iter().enumerate() {
            if subset.labels.is_empty() {
                continue;
            }
            let no_match = ctx
                .resolver
                .workloads(Some(&target_ns), &subset.labels)
                .is_some_and(|matched| matched.is_empty());
            if no_match {
                entry.fail(
                    Check::warning(
                        self.code(),
                        format!("This subset's labels are not found in any matching host: {}", subset.name),
                        format!("spec/subsets[{}]/labels", i),
                    ),
                    Vec::new(),
                );
            }
        }
    }
}

/// KIA1201: a service entry's workload selector must match a workload entry
pub struct WorkloadEntrySelector;

impl Rule for WorkloadEntrySelector {
    fn code(&self) -> &'static str {
        "KIA1201"
    }

    fn description(&self) -> &'static str {
        "Service entry workload selectors must match a workload entry"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::ServiceEntry]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::ServiceEntry(se) = obj else {
            return;
        };
        let has_selector = se
            .spec
            .workload_selector
            .as_ref()
            .is_some_and(|sel| !sel.labels.is_empty());
        if !has_selector || !ctx.state.kind_fetched(obj.namespace(), ConfigKind::WorkloadEntry) {
            return;
        }
        let key: RefKey = obj.key().into();
        let matched = ctx
            .graph
            .outgoing(&key)
            .iter()
            .any(|(edge, _)| edge.relation == Relation::Selects);
        if !matched {
            entry.fail(
                Check::warning(
                    self.code(),
                    "No matching workload entry found for the selector",
                    "spec/workloadSelector",
                ),
                Vec::new(),
            );
        }
    }
}
