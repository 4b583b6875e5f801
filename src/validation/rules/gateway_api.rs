use super::ROUTE_KINDS;
use crate::models::{Check, ConfigKind, ConfigRef, RefKey, ValidationEntry};
use crate::references::extract::granting_reference_grants;
use crate::references::Relation;
use crate::validation::{Rule, RuleContext};

/// KIA1403: cross-namespace backends need a reference grant in the backend's namespace
pub struct ReferenceGrantRequired;

impl Rule for ReferenceGrantRequired {
    fn code(&self) -> &'static str {
        "KIA1403"
    }

    fn description(&self) -> &'static str {
        "Cross-namespace backends need a reference grant"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        ROUTE_KINDS
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ns = obj.namespace();
        let key: RefKey = obj.key().into();
        for (edge, node) in ctx.graph.outgoing(&key) {
            let target = &node.key;
            if edge.relation != Relation::Backend || target.namespace == ns {
                continue;
            }
            if !ctx
                .state
                .kind_fetched(&target.namespace, ConfigKind::K8sReferenceGrant)
            {
                continue;
            }
            let grants =
                granting_reference_grants(&ctx.resolver, obj.kind(), ns, &target.namespace, &target.name);
            if grants.is_empty() {
                entry.fail(
                    Check::error(
                        self.code(),
                        format!(
                            "BackendRef on rule doesn't have a valid ReferenceGrant in namespace {}",
                            target.namespace
                        ),
                        edge.path.clone(),
                    ),
                    [target.clone()],
                );
            }
        }
    }
}

/// KIA1602: a reference grant should be used by at least one route
pub struct UnusedReferenceGrant;

impl Rule for UnusedReferenceGrant {
    fn code(&self) -> &'static str {
        "KIA1602"
    }

    fn description(&self) -> &'static str {
        "Reference grants should be used by a route"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::K8sReferenceGrant]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::K8sReferenceGrant(grant) = obj else {
            return;
        };
        let key: RefKey = obj.key().into();
        let used = ctx
            .graph
            .incoming(&key)
            .iter()
            .any(|(edge, _)| edge.relation == Relation::GrantedBy);
        if used {
            return;
        }

        // Only route sources can be judged, and only when their namespace was listed
        let sources: Vec<(ConfigKind, &str)> = grant
            .spec
            .from
            .iter()
            .filter_map(|from| {
                ConfigKind::parse_optional(&from.kind)
                    .filter(|kind| kind.is_k8s_route())
                    .map(|kind| (kind, from.namespace.as_str()))
            })
            .collect();
        let decidable = !sources.is_empty()
            && sources
                .iter()
                .all(|(kind, ns)| ctx.state.kind_fetched(ns, *kind));
        if decidable {
            entry.fail(
                Check::warning(self.code(), "ReferenceGrant is not used by any route", "spec/from"),
                Vec::new(),
            );
        }
    }
}
