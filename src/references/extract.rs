//! Per-kind extraction of outgoing references

use std::collections::BTreeMap;

use super::graph::Relation;
use super::resolve::{Resolution, Resolver, TargetStatus};
use crate::models::gateway_api::{ParentReference, RouteRule};
use crate::models::istio::{Destination, VirtualServiceSpec};
use crate::models::{ConfigKind, ConfigRef, RefKey};

/// One outgoing reference, with the field it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: Resolution,
    pub relation: Relation,
    pub path: String,
}

impl Link {
    fn new(target: Resolution, relation: Relation, path: impl Into<String>) -> Self {
        Self {
            target,
            relation,
            path: path.into(),
        }
    }

    fn present(target: RefKey, relation: Relation, path: impl Into<String>) -> Self {
        Self::new(
            Resolution {
                target,
                status: TargetStatus::Present,
            },
            relation,
            path,
        )
    }
}

/// Outgoing references of `obj`, in field order
pub fn links(resolver: &Resolver<'_>, obj: ConfigRef<'_>) -> Vec<Link> {
    let ns = obj.namespace();
    match obj {
        ConfigRef::VirtualService(vs) => virtual_service_links(resolver, ns, &vs.spec),
        ConfigRef::DestinationRule(dr) => {
            let mut links = vec![Link::new(
                resolver.host(&dr.spec.host, ns),
                Relation::Host,
                "spec/host",
            )];
            let workload_ns = subset_namespace(resolver, &dr.spec.host, ns);
            for (i, subset) in dr.spec.subsets.iter().enumerate() {
                if subset.labels.is_empty() {
                    continue;
                }
                links.extend(selected_workloads(
                    resolver,
                    Some(&workload_ns),
                    &subset.labels,
                    Relation::SubsetWorkload,
                    format!("spec/subsets[{}]/labels", i),
                ));
            }
            links
        }
        ConfigRef::Gateway(gw) => {
            selected_workloads(resolver, None, &gw.spec.selector, Relation::Selects, "spec/selector")
        }
        ConfigRef::K8sGateway(_) => Vec::new(),
        ConfigRef::K8sHTTPRoute(route) => {
            route_links(resolver, obj, &route.spec.parent_refs, &route.spec.rules)
        }
        ConfigRef::K8sGRPCRoute(route) => {
            route_links(resolver, obj, &route.spec.parent_refs, &route.spec.rules)
        }
        ConfigRef::K8sTCPRoute(route) => {
            route_links(resolver, obj, &route.spec.parent_refs, &route.spec.rules)
        }
        ConfigRef::K8sTLSRoute(route) => {
            route_links(resolver, obj, &route.spec.parent_refs, &route.spec.rules)
        }
        ConfigRef::K8sReferenceGrant(grant) => grant
            .spec
            .from
            .iter()
            .enumerate()
            .map(|(i, from)| {
                Link::new(
                    resolver.namespace(&from.namespace),
                    Relation::FromNamespace,
                    format!("spec/from[{}]/namespace", i),
                )
            })
            .collect(),
        ConfigRef::PeerAuthentication(pa) => label_selector_links(
            resolver,
            ns,
            pa.spec.selector.as_ref().map(|s| &s.match_labels),
        ),
        ConfigRef::RequestAuthentication(ra) => label_selector_links(
            resolver,
            ns,
            ra.spec.selector.as_ref().map(|s| &s.match_labels),
        ),
        ConfigRef::AuthorizationPolicy(ap) => {
            let mut links = label_selector_links(
                resolver,
                ns,
                ap.spec.selector.as_ref().map(|s| &s.match_labels),
            );
            for (i, rule) in ap.spec.rules.iter().enumerate() {
                for (j, from) in rule.from.iter().enumerate() {
                    let Some(source) = &from.source else { continue };
                    for (k, namespace) in source.namespaces.iter().enumerate() {
                        if namespace.contains('*') {
                            continue;
                        }
                        links.push(Link::new(
                            resolver.namespace(namespace),
                            Relation::SourceNamespace,
                            format!("spec/rules[{}]/from[{}]/source/namespaces[{}]", i, j, k),
                        ));
                    }
                }
                for (j, to) in rule.to.iter().enumerate() {
                    let Some(operation) = &to.operation else { continue };
                    for (k, host) in operation.hosts.iter().enumerate() {
                        let host = strip_port(host);
                        if host.contains('*') {
                            continue;
                        }
                        links.push(Link::new(
                            resolver.host(host, ns),
                            Relation::OperationHost,
                            format!("spec/rules[{}]/to[{}]/operation/hosts[{}]", i, j, k),
                        ));
                    }
                }
            }
            links
        }
        ConfigRef::Sidecar(sc) => {
            let mut links = workload_selector_links(
                resolver,
                ns,
                sc.spec.workload_selector.as_ref().map(|s| &s.labels),
            );
            for (i, egress) in sc.spec.egress.iter().enumerate() {
                for (j, entry) in egress.hosts.iter().enumerate() {
                    let Some((host_ns, host)) = entry.split_once('/') else {
                        continue;
                    };
                    if host_ns == "~" || host == "*" || host.starts_with('*') {
                        continue;
                    }
                    let from = match host_ns {
                        "." | "*" => ns,
                        other => other,
                    };
                    links.push(Link::new(
                        resolver.host(host, from),
                        Relation::EgressHost,
                        format!("spec/egress[{}]/hosts[{}]", i, j),
                    ));
                }
            }
            links
        }
        ConfigRef::EnvoyFilter(ef) => workload_selector_links(
            resolver,
            ns,
            ef.spec.workload_selector.as_ref().map(|s| &s.labels),
        ),
        ConfigRef::ServiceEntry(se) => match &se.spec.workload_selector {
            Some(selector) => workload_entries_matching(resolver, ns, &selector.labels)
                .into_iter()
                .map(|key| Link::present(key, Relation::Selects, "spec/workloadSelector"))
                .collect(),
            None => Vec::new(),
        },
        ConfigRef::WorkloadEntry(we) => resolver
            .state()
            .list(ns)
            .map(|list| list.objects_of(ConfigKind::ServiceEntry))
            .unwrap_or_default()
            .into_iter()
            .filter(|se| match se {
                ConfigRef::ServiceEntry(se) => se
                    .spec
                    .workload_selector
                    .as_ref()
                    .is_some_and(|sel| selects(&sel.labels, &we.spec.labels)),
                _ => false,
            })
            .map(|se| Link::present(se.key().into(), Relation::SelectedBy, "spec/labels"))
            .collect(),
        ConfigRef::WorkloadGroup(wg) => match wg.spec.template_labels() {
            Some(labels) => workload_entries_matching(resolver, ns, labels)
                .into_iter()
                .map(|key| Link::present(key, Relation::Selects, "spec/metadata/labels"))
                .collect(),
            None => Vec::new(),
        },
    }
}

fn virtual_service_links(
    resolver: &Resolver<'_>,
    ns: &str,
    spec: &VirtualServiceSpec,
) -> Vec<Link> {
    let mut links = Vec::new();

    for (i, gateway) in spec.gateways.iter().enumerate() {
        if gateway == "mesh" {
            continue;
        }
        let (gw_ns, gw_name) = split_gateway(gateway, ns);
        links.push(Link::new(
            resolver.config(ConfigKind::Gateway, &gw_ns, &gw_name),
            Relation::Gateway,
            format!("spec/gateways[{}]", i),
        ));
    }

    let mut seen_hosts = Vec::new();
    for (destination, path) in destinations(spec) {
        let path = format!("{}/host", path);
        links.push(Link::new(
            resolver.host(&destination.host, ns),
            Relation::DestinationHost,
            path.clone(),
        ));

        let canonical = resolver.canonical(&destination.host, ns);
        if seen_hosts.contains(&canonical) {
            continue;
        }
        for dr in destination_rules_for(resolver, &canonical) {
            links.push(Link::present(dr, Relation::DestinationRule, path.clone()));
        }
        seen_hosts.push(canonical);
    }
    links
}

/// Every routed or mirrored destination with the path of its `destination` field
pub(crate) fn destinations(spec: &VirtualServiceSpec) -> Vec<(&Destination, String)> {
    let mut destinations = Vec::new();
    for (i, route) in spec.http.iter().enumerate() {
        for (j, rd) in route.route.iter().enumerate() {
            destinations.push((&rd.destination, format!("spec/http[{}]/route[{}]/destination", i, j)));
        }
        if let Some(mirror) = &route.mirror {
            destinations.push((mirror, format!("spec/http[{}]/mirror", i)));
        }
    }
    for (protocol, routes) in [("tcp", &spec.tcp), ("tls", &spec.tls)] {
        for (i, route) in routes.iter().enumerate() {
            for (j, rd) in route.route.iter().enumerate() {
                destinations.push((
                    &rd.destination,
                    format!("spec/{}[{}]/route[{}]/destination", protocol, i, j),
                ));
            }
        }
    }
    destinations
}

/// Destination rules, in fetch order, whose host is `canonical_host`
pub fn destination_rules_for(resolver: &Resolver<'_>, canonical_host: &str) -> Vec<RefKey> {
    resolver
        .state()
        .objects_of(ConfigKind::DestinationRule)
        .into_iter()
        .filter(|obj| match obj {
            ConfigRef::DestinationRule(dr) => {
                resolver.canonical(&dr.spec.host, obj.namespace()) == canonical_host
            }
            _ => false,
        })
        .map(|obj| obj.key().into())
        .collect()
}

fn route_links(
    resolver: &Resolver<'_>,
    route: ConfigRef<'_>,
    parent_refs: &[ParentReference],
    rules: &[RouteRule],
) -> Vec<Link> {
    let ns = route.namespace();
    let mut links = Vec::new();

    for (i, parent) in parent_refs.iter().enumerate() {
        if !parent.targets_gateway() {
            continue;
        }
        let parent_ns = parent.namespace.as_deref().unwrap_or(ns);
        links.push(Link::new(
            resolver.config(ConfigKind::K8sGateway, parent_ns, &parent.name),
            Relation::ParentGateway,
            format!("spec/parentRefs[{}]", i),
        ));
    }

    for (i, rule) in rules.iter().enumerate() {
        for (j, backend) in rule.backend_refs.iter().enumerate() {
            if !backend.targets_service() {
                continue;
            }
            let path = format!("spec/rules[{}]/backendRefs[{}]", i, j);
            let backend_ns = backend.namespace.as_deref().unwrap_or(ns);
            links.push(Link::new(
                resolver.service(backend_ns, &backend.name),
                Relation::Backend,
                path.clone(),
            ));
            if backend_ns != ns {
                for grant in
                    granting_reference_grants(resolver, route.kind(), ns, backend_ns, &backend.name)
                {
                    links.push(Link::present(grant, Relation::GrantedBy, path.clone()));
                }
            }
        }
    }
    links
}

/// Reference grants in `target_ns` allowing a `route_kind` in `from_ns` to reach `service`
pub fn granting_reference_grants(
    resolver: &Resolver<'_>,
    route_kind: ConfigKind,
    from_ns: &str,
    target_ns: &str,
    service: &str,
) -> Vec<RefKey> {
    resolver
        .state()
        .list(target_ns)
        .map(|list| list.objects_of(ConfigKind::K8sReferenceGrant))
        .unwrap_or_default()
        .into_iter()
        .filter(|obj| match obj {
            ConfigRef::K8sReferenceGrant(grant) => {
                grant.spec.allows(route_kind.kind_str(), from_ns, service)
            }
            _ => false,
        })
        .map(|obj| obj.key().into())
        .collect()
}

fn label_selector_links(
    resolver: &Resolver<'_>,
    ns: &str,
    selector: Option<&BTreeMap<String, String>>,
) -> Vec<Link> {
    match selector.filter(|labels| !labels.is_empty()) {
        Some(labels) => {
            selected_workloads(resolver, Some(ns), labels, Relation::Selects, "spec/selector")
        }
        None => Vec::new(),
    }
}

fn workload_selector_links(
    resolver: &Resolver<'_>,
    ns: &str,
    selector: Option<&BTreeMap<String, String>>,
) -> Vec<Link> {
    match selector.filter(|labels| !labels.is_empty()) {
        Some(labels) => selected_workloads(
            resolver,
            Some(ns),
            labels,
            Relation::Selects,
            "spec/workloadSelector",
        ),
        None => Vec::new(),
    }
}

fn selected_workloads(
    resolver: &Resolver<'_>,
    ns: Option<&str>,
    labels: &BTreeMap<String, String>,
    relation: Relation,
    path: impl Into<String>,
) -> Vec<Link> {
    let path = path.into();
    resolver
        .workloads(ns, labels)
        .unwrap_or_default()
        .into_iter()
        .map(|w| Link::present(RefKey::workload(&w.namespace, &w.name), relation, path.clone()))
        .collect()
}

fn workload_entries_matching(
    resolver: &Resolver<'_>,
    ns: &str,
    selector: &BTreeMap<String, String>,
) -> Vec<RefKey> {
    resolver
        .state()
        .list(ns)
        .map(|list| list.objects_of(ConfigKind::WorkloadEntry))
        .unwrap_or_default()
        .into_iter()
        .filter(|obj| match obj {
            ConfigRef::WorkloadEntry(we) => selects(selector, &we.spec.labels),
            _ => false,
        })
        .map(|obj| obj.key().into())
        .collect()
}

/// An empty selector selects nothing here
pub(crate) fn selects(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    !selector.is_empty()
        && selector
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|l| l == v))
}

/// Namespace in which a DR's subsets pick their workloads
pub(crate) fn subset_namespace(resolver: &Resolver<'_>, host: &str, ns: &str) -> String {
    match resolver.parse(host, ns) {
        super::hosts::ParsedHost::Service { namespace, .. } => namespace,
        _ => ns.to_string(),
    }
}

/// `ns/name`, `name.ns.svc...` or `name` relative to the virtual service
pub(crate) fn split_gateway(gateway: &str, ns: &str) -> (String, String) {
    if let Some((gw_ns, name)) = gateway.split_once('/') {
        return (gw_ns.to_string(), name.to_string());
    }
    match gateway.split_once('.') {
        Some((name, rest)) => {
            let gw_ns = rest.split('.').next().unwrap_or(ns);
            (gw_ns.to_string(), name.to_string())
        }
        None => (ns.to_string(), gateway.to_string()),
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_gateway_forms() {
        assert_eq!(
            split_gateway("istio-system/ingress", "bookinfo"),
            ("istio-system".into(), "ingress".into())
        );
        assert_eq!(
            split_gateway("ingress.istio-system.svc.cluster.local", "bookinfo"),
            ("istio-system".into(), "ingress".into())
        );
        assert_eq!(
            split_gateway("bookinfo-gateway", "bookinfo"),
            ("bookinfo".into(), "bookinfo-gateway".into())
        );
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("reviews:9080"), "reviews");
        assert_eq!(strip_port("reviews"), "reviews");
    }

    #[test]
    fn test_empty_selector_selects_nothing() {
        let labels: BTreeMap<String, String> = [("app".to_string(), "x".to_string())].into();
        assert!(!selects(&BTreeMap::new(), &labels));
        assert!(selects(&labels, &labels));
    }
}
