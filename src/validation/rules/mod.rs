//! Rule set, version 1
//!
//! Codes follow the KIA numbering used by mesh consoles so reports stay
//! comparable across tools.

mod duplicates;
mod gateway_api;
mod mtls;
mod references;
mod selectors;
mod virtual_service;

use std::collections::BTreeMap;

use super::Rule;
use crate::models::{ConfigKind, ConfigRef, Severity};
use crate::references::Relation;

pub use duplicates::{
    DuplicateDestinationRule, DuplicateGatewayHost, DuplicateK8sGatewayListener,
    DuplicateListenerName, DuplicateVirtualService,
};
pub use gateway_api::{ReferenceGrantRequired, UnusedReferenceGrant};
pub use mtls::StrictMtlsConflict;
pub use references::MissingTarget;
pub use selectors::{NamespaceWideUniqueness, SubsetLabels, WorkloadEntrySelector, WorkloadSelectorMatch};
pub use virtual_service::SubsetDefined;

pub(crate) const ROUTE_KINDS: &[ConfigKind] = &[
    ConfigKind::K8sHTTPRoute,
    ConfigKind::K8sGRPCRoute,
    ConfigKind::K8sTCPRoute,
    ConfigKind::K8sTLSRoute,
];

/// The default rules, in code order
pub fn all() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(NamespaceWideUniqueness),
        Box::new(WorkloadSelectorMatch),
        Box::new(MissingTarget {
            code: "KIA0101",
            description: "Authorization policy source namespaces must exist",
            kinds: &[ConfigKind::AuthorizationPolicy],
            relation: Relation::SourceNamespace,
            message: "Namespace not found for this rule",
            severity: Severity::Warning,
        }),
        Box::new(MissingTarget {
            code: "KIA0104",
            description: "Authorization policy operation hosts must exist",
            kinds: &[ConfigKind::AuthorizationPolicy],
            relation: Relation::OperationHost,
            message: "This host has no matching entry in the service registry",
            severity: Severity::Warning,
        }),
        Box::new(DuplicateDestinationRule),
        Box::new(MissingTarget {
            code: "KIA0202",
            description: "Destination rule host must exist",
            kinds: &[ConfigKind::DestinationRule],
            relation: Relation::Host,
            message: "This host has no matching entry in the service registry (service, workload or service entries)",
            severity: Severity::Warning,
        }),
        Box::new(SubsetLabels),
        Box::new(DuplicateGatewayHost),
        Box::new(StrictMtlsConflict),
        Box::new(MissingTarget {
            code: "KIA1004",
            description: "Sidecar egress hosts must exist",
            kinds: &[ConfigKind::Sidecar],
            relation: Relation::EgressHost,
            message: "This host has no matching entry in the service registry",
            severity: Severity::Warning,
        }),
        Box::new(MissingTarget {
            code: "KIA1101",
            description: "Virtual service destination hosts must exist",
            kinds: &[ConfigKind::VirtualService],
            relation: Relation::DestinationHost,
            message: "DestinationWeight on route doesn't have a valid service (host not found)",
            severity: Severity::Error,
        }),
        Box::new(MissingTarget {
            code: "KIA1105",
            description: "Virtual service gateways must exist",
            kinds: &[ConfigKind::VirtualService],
            relation: Relation::Gateway,
            message: "VirtualService is pointing to a non-existent gateway",
            severity: Severity::Error,
        }),
        Box::new(DuplicateVirtualService),
        Box::new(SubsetDefined),
        Box::new(WorkloadEntrySelector),
        Box::new(MissingTarget {
            code: "KIA1401",
            description: "Route parent gateways must exist",
            kinds: ROUTE_KINDS,
            relation: Relation::ParentGateway,
            message: "Route is pointing to a non-existent K8s gateway",
            severity: Severity::Error,
        }),
        Box::new(MissingTarget {
            code: "KIA1402",
            description: "Route backend services must exist",
            kinds: ROUTE_KINDS,
            relation: Relation::Backend,
            message: "BackendRef on rule doesn't have a valid service (host not found)",
            severity: Severity::Error,
        }),
        Box::new(ReferenceGrantRequired),
        Box::new(DuplicateK8sGatewayListener),
        Box::new(DuplicateListenerName),
        Box::new(MissingTarget {
            code: "KIA1601",
            description: "Reference grant source namespaces must exist",
            kinds: &[ConfigKind::K8sReferenceGrant],
            relation: Relation::FromNamespace,
            message: "Namespace is not found or is not accessible",
            severity: Severity::Error,
        }),
        Box::new(UnusedReferenceGrant),
    ]
}

/// Non-empty workload selector of `obj` and the field holding it
pub(crate) fn workload_selector<'a>(
    obj: ConfigRef<'a>,
) -> Option<(&'a BTreeMap<String, String>, &'static str)> {
    let selector = match obj {
        ConfigRef::PeerAuthentication(pa) => {
            pa.spec.selector.as_ref().map(|s| (&s.match_labels, "spec/selector"))
        }
        ConfigRef::RequestAuthentication(ra) => {
            ra.spec.selector.as_ref().map(|s| (&s.match_labels, "spec/selector"))
        }
        ConfigRef::AuthorizationPolicy(ap) => {
            ap.spec.selector.as_ref().map(|s| (&s.match_labels, "spec/selector"))
        }
        ConfigRef::Sidecar(sc) => sc
            .spec
            .workload_selector
            .as_ref()
            .map(|s| (&s.labels, "spec/workloadSelector")),
        ConfigRef::EnvoyFilter(ef) => ef
            .spec
            .workload_selector
            .as_ref()
            .map(|s| (&s.labels, "spec/workloadSelector")),
        ConfigRef::Gateway(gw) => Some((&gw.spec.selector, "spec/selector")),
        _ => None,
    };
    selector.filter(|(labels, _)| !labels.is_empty())
}

/// Other objects of the same kind in the same namespace
pub(crate) fn siblings<'a>(
    ctx: &super::RuleContext<'a>,
    obj: ConfigRef<'_>,
) -> Vec<ConfigRef<'a>> {
    ctx.state
        .list(obj.namespace())
        .map(|list| list.objects_of(obj.kind()))
        .unwrap_or_default()
        .into_iter()
        .filter(|other| other.name() != obj.name())
        .collect()
}
