use crate::models::{Check, ConfigKind, ConfigRef, RefKey, Severity, ValidationEntry};
use crate::references::{Relation, TargetStatus};
use crate::validation::{Rule, RuleContext};

/// Fails once per outgoing `relation` edge whose target is known to be absent
pub struct MissingTarget {
    pub code: &'static str,
    pub description: &'static str,
    pub kinds: &'static [ConfigKind],
    pub relation: Relation,
    pub message: &'static str,
    pub severity: Severity,
}

impl Rule for MissingTarget {
    fn code(&self) -> &'static str {
        self.code
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn kinds(&self) -> &'static [ConfigKind] {
        self.kinds
    }

    fn check(&self, ctx: &RuleContext<'_>, obj: ConfigRef<'_>, entry: &mut ValidationEntry) {
        let key: RefKey = obj.key().into();
        for (edge, node) in ctx.graph.outgoing(&key) {
            if edge.relation != self.relation || node.status != TargetStatus::Missing {
                continue;
            }
            let check = Check {
                code: self.code.to_string(),
                message: format!("{}: {}", self.message, node.key.name),
                severity: self.severity,
                path: edge.path.clone(),
            };
            entry.fail(check, [node.key.clone()]);
        }
    }
}
