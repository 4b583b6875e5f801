use crate::kube::Scope;
use crate::models::{Check, ConfigKind, ConfigRef, RefKey, ValidationEntry};
use crate::references::ParsedHost;
use crate::references::extract::{destination_rules_for, destinations};
use crate::validation::{Rule, RuleContext};

/// KIA1107: routed subsets must be defined by a destination rule for the host
pub struct SubsetDefined;

impl Rule for SubsetDefined {
    fn code(&self) -> &'static str {
        "KIA1107"
    }

    fn description(&self) -> &'static str {
        "Virtual service subsets must be defined by a destination rule"
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        &[ConfigKind::VirtualService]
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let ConfigRef::VirtualService(vs) = obj else {
            return;
        };
        // A defining rule may sit in any namespace; absence is only known when all were listed
        if ctx.state.scope != Scope::All {
            return;
        }
        let all_listed = ctx
            .state
            .namespaces()
            .all(|ns| ctx.state.kind_fetched(ns, ConfigKind::DestinationRule));
        if !all_listed {
            return;
        }

        for (destination, path) in destinations(&vs.spec) {
            let Some(subset) = destination.subset.as_deref() else {
                continue;
            };
            if let ParsedHost::Service { namespace, .. } =
                ctx.resolver.parse(&destination.host, obj.namespace())
                && !ctx.state.in_scope(&namespace)
            {
                continue;
            }
            let canonical = ctx.resolver.canonical(&destination.host, obj.namespace());
            let rules = destination_rules_for(&ctx.resolver, &canonical);
            let defined = rules.iter().any(|key| {
                key.object_key()
                    .and_then(|key| ctx.state.find(&key))
                    .is_some_and(|dr| match dr {
                        ConfigRef::DestinationRule(dr) => {
                            dr.spec.subsets.iter().any(|s| s.name == subset)
                        }
                        _ => false,
                    })
            });
            if defined {
                continue;
            }
            let implicated: Vec<RefKey> = if rules.is_empty() {
                vec![RefKey::config(ConfigKind::VirtualService, obj.namespace(), obj.name())]
            } else {
                rules
            };
            entry.fail(
                Check::warning(
                    self.code(),
                    format!("Subset {} not found", subset),
                    format!("{}/subset", path),
                ),
                implicated,
            );
        }
    }
}
