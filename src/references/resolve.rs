//! Lookup of reference targets in the collected state

use serde::Serialize;
use std::collections::BTreeMap;

use super::hosts::{ParsedHost, fqdn, host_matches, parse_host};
use crate::collector::CollectedState;
use crate::kube::Scope;
use crate::models::{ConfigKind, ConfigRef, RefKey, Workload};

/// Whether a reference target exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Present,
    /// In scope and fetched, but absent
    Missing,
    /// Out of scope or not fetched; never a failure
    Unknown,
}

impl TargetStatus {
    fn from_lookup(found: Option<bool>) -> Self {
        match found {
            Some(true) => TargetStatus::Present,
            Some(false) => TargetStatus::Missing,
            None => TargetStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: RefKey,
    pub status: TargetStatus,
}

impl Resolution {
    fn new(target: RefKey, status: TargetStatus) -> Self {
        Self { target, status }
    }

    pub fn is_missing(&self) -> bool {
        self.status == TargetStatus::Missing
    }
}

pub struct Resolver<'a> {
    state: &'a CollectedState,
    suffix: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(state: &'a CollectedState, suffix: &'a str) -> Self {
        Self { state, suffix }
    }

    pub fn state(&self) -> &'a CollectedState {
        self.state
    }

    pub fn suffix(&self) -> &'a str {
        self.suffix
    }

    fn namespace_known(&self, namespace: &str) -> bool {
        self.state.in_scope(namespace)
            || self.state.registry.namespace_exists(namespace) == Some(true)
    }

    /// Parse a host, settling `name.ns` against the known namespaces
    pub fn parse(&self, host: &str, from_namespace: &str) -> ParsedHost {
        match parse_host(host, from_namespace, self.suffix) {
            ParsedHost::ShortService { namespace, name } if self.namespace_known(&namespace) => {
                ParsedHost::Service { namespace, name }
            }
            ParsedHost::ShortService { namespace, name } => {
                ParsedHost::External(format!("{}.{}", name, namespace))
            }
            other => other,
        }
    }

    /// Comparable form of a host: the service FQDN, or the host itself
    pub fn canonical(&self, host: &str, from_namespace: &str) -> String {
        match self.parse(host, from_namespace) {
            ParsedHost::Service { namespace, name } => fqdn(&namespace, &name, self.suffix),
            ParsedHost::ShortService { .. } => host.to_lowercase(),
            ParsedHost::Wildcard(host) | ParsedHost::External(host) => host,
        }
    }

    /// Service entries, in fetch order, declaring a host that covers `host`
    pub fn service_entries_for(&self, host: &str, from_namespace: &str) -> Vec<ConfigRef<'a>> {
        let canonical = self.canonical(host, from_namespace);
        self.state
            .objects_of(ConfigKind::ServiceEntry)
            .into_iter()
            .filter(|obj| match obj {
                ConfigRef::ServiceEntry(se) => se.spec.hosts.iter().any(|h| {
                    host_matches(&self.canonical(h, obj.namespace()), &canonical)
                }),
                _ => false,
            })
            .collect()
    }

    /// Resolve a destination-style host to a service, service entry or external host
    pub fn host(&self, host: &str, from_namespace: &str) -> Resolution {
        let parsed = self.parse(host, from_namespace);
        if let ParsedHost::Wildcard(pattern) = &parsed {
            return Resolution::new(RefKey::host(pattern.clone()), TargetStatus::Unknown);
        }

        if let Some(se) = self.service_entries_for(host, from_namespace).first() {
            return Resolution::new(se.key().into(), TargetStatus::Present);
        }

        match parsed {
            ParsedHost::Service { namespace, name } => self.service(&namespace, &name),
            other => {
                let host = match other {
                    ParsedHost::External(host) | ParsedHost::Wildcard(host) => host,
                    ParsedHost::Service { name, .. } | ParsedHost::ShortService { name, .. } => name,
                };
                // External hosts can only be ruled out when every namespace was searched
                let searched_everywhere = self.state.scope == Scope::All
                    && self
                        .state
                        .namespaces()
                        .all(|ns| self.state.kind_fetched(ns, ConfigKind::ServiceEntry));
                let status = if searched_everywhere {
                    TargetStatus::Missing
                } else {
                    TargetStatus::Unknown
                };
                Resolution::new(RefKey::host(host), status)
            }
        }
    }

    pub fn service(&self, namespace: &str, name: &str) -> Resolution {
        let target = RefKey::service(namespace, name);
        if !self.state.in_scope(namespace) {
            return Resolution::new(target, TargetStatus::Unknown);
        }
        let status = TargetStatus::from_lookup(self.state.registry.service_exists(namespace, name));
        Resolution::new(target, status)
    }

    pub fn config(&self, kind: ConfigKind, namespace: &str, name: &str) -> Resolution {
        let target = RefKey::config(kind, namespace, name);
        let found = self
            .state
            .list(namespace)
            .and_then(|list| list.find(kind, name))
            .is_some();
        let status = if found {
            TargetStatus::Present
        } else if self.state.kind_fetched(namespace, kind) {
            TargetStatus::Missing
        } else {
            TargetStatus::Unknown
        };
        Resolution::new(target, status)
    }

    pub fn namespace(&self, name: &str) -> Resolution {
        let status = match self.state.registry.namespace_exists(name) {
            Some(found) => TargetStatus::from_lookup(Some(found)),
            None if self.state.in_scope(name) => TargetStatus::Present,
            None => TargetStatus::Unknown,
        };
        Resolution::new(RefKey::namespace(name), status)
    }

    /// Workloads matched by `selector`; `None` when the answer is unknown
    ///
    /// Without a namespace the search spans the cluster, which a
    /// single-namespace collection can only answer positively.
    pub fn workloads(
        &self,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Option<Vec<&'a Workload>> {
        if let Some(ns) = namespace {
            if !self.state.in_scope(ns) {
                return None;
            }
        }
        let matches = self.state.registry.matching_workloads(namespace, selector)?;
        if namespace.is_none() && self.state.scope != Scope::All && matches.is_empty() {
            return None;
        }
        Some(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigObject, ServiceInfo};
    use crate::references::hosts::DEFAULT_CLUSTER_DOMAIN_SUFFIX;
    use serde_json::json;

    fn state() -> CollectedState {
        let mut state = CollectedState::new(Scope::Namespace("bookinfo".into()), ["bookinfo"]);
        state.registry.namespaces = Some(["bookinfo", "istio-system"].iter().map(|s| s.to_string()).collect());
        state.registry.services = Some(vec![ServiceInfo {
            namespace: "bookinfo".into(),
            name: "reviews".into(),
        }]);
        state.mark_fetched("bookinfo", ConfigKind::ServiceEntry);
        let se = ConfigObject::decode(
            ConfigKind::ServiceEntry,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "ServiceEntry",
                "metadata": {"name": "external", "namespace": "bookinfo"},
                "spec": {"hosts": ["*.example.com"]}
            }),
        )
        .unwrap();
        state.list_mut("bookinfo").unwrap().push(se).unwrap();
        state
    }

    #[test]
    fn test_host_resolution() {
        let state = state();
        let resolver = Resolver::new(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);

        assert_eq!(resolver.host("reviews", "bookinfo").status, TargetStatus::Present);
        assert_eq!(
            resolver.host("reviews.bookinfo.svc.cluster.local", "bookinfo").status,
            TargetStatus::Present
        );
        assert_eq!(resolver.host("nope", "bookinfo").status, TargetStatus::Missing);
        assert_eq!(
            resolver.host("reviews.other.svc.cluster.local", "bookinfo").status,
            TargetStatus::Unknown
        );

        let se = resolver.host("api.example.com", "bookinfo");
        assert_eq!(se.status, TargetStatus::Present);
        assert_eq!(se.target, RefKey::config(ConfigKind::ServiceEntry, "bookinfo", "external"));

        // Other service entries may live in namespaces that were not collected
        assert_eq!(resolver.host("api.other.org", "bookinfo").status, TargetStatus::Unknown);
    }

    #[test]
    fn test_short_host_needs_known_namespace() {
        let state = state();
        let resolver = Resolver::new(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        assert!(matches!(
            resolver.parse("reviews.bookinfo", "bookinfo"),
            ParsedHost::Service { .. }
        ));
        assert!(matches!(
            resolver.parse("example.com", "bookinfo"),
            ParsedHost::External(_)
        ));
    }

    #[test]
    fn test_config_and_namespace_status() {
        let state = state();
        let resolver = Resolver::new(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        assert_eq!(
            resolver.config(ConfigKind::ServiceEntry, "bookinfo", "missing").status,
            TargetStatus::Missing
        );
        assert_eq!(
            resolver.config(ConfigKind::Gateway, "bookinfo", "gw").status,
            TargetStatus::Unknown
        );
        assert_eq!(resolver.namespace("istio-system").status, TargetStatus::Present);
        assert_eq!(resolver.namespace("ghost").status, TargetStatus::Missing);
    }
}
