//! Per-namespace aggregate of collected config objects

use serde::{Deserialize, Serialize};
use std::fmt;

use super::gateway_api::{GRPCRoute, HTTPRoute, ReferenceGrant, TCPRoute, TLSRoute};
use super::istio::{
    AuthorizationPolicy, DestinationRule, EnvoyFilter, PeerAuthentication, RequestAuthentication,
    ServiceEntry, Sidecar, VirtualService, WorkloadEntry, WorkloadGroup,
};
use super::validation::ValidationReport;
use super::{ConfigKind, ConfigObject, ConfigRef, IstioGateway, K8sGatewayResource};

/// Non-fatal problem recorded while building a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Kind resource name, or a registry part such as `services`
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        subject: impl Into<String>,
        namespace: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            namespace: namespace.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn for_kind(kind: ConfigKind, namespace: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(kind.resource_name(), namespace, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} in {}: {}", self.subject, ns, self.message),
            None => write!(f, "{}: {}", self.subject, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRef {
    pub name: String,
}

/// All config objects of one namespace, grouped by kind
///
/// Every stored object belongs to `namespace` and has a name; `push` rejects
/// anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigList {
    pub namespace: NamespaceRef,
    pub destination_rules: Vec<DestinationRule>,
    pub virtual_services: Vec<VirtualService>,
    pub gateways: Vec<IstioGateway>,
    #[serde(rename = "k8sGateways")]
    pub k8s_gateways: Vec<K8sGatewayResource>,
    #[serde(rename = "k8sGRPCRoutes")]
    pub k8s_grpc_routes: Vec<GRPCRoute>,
    #[serde(rename = "k8sHTTPRoutes")]
    pub k8s_http_routes: Vec<HTTPRoute>,
    #[serde(rename = "k8sReferenceGrants")]
    pub k8s_reference_grants: Vec<ReferenceGrant>,
    #[serde(rename = "k8sTCPRoutes")]
    pub k8s_tcp_routes: Vec<TCPRoute>,
    #[serde(rename = "k8sTLSRoutes")]
    pub k8s_tls_routes: Vec<TLSRoute>,
    pub peer_authentications: Vec<PeerAuthentication>,
    pub request_authentications: Vec<RequestAuthentication>,
    pub authorization_policies: Vec<AuthorizationPolicy>,
    pub service_entries: Vec<ServiceEntry>,
    pub sidecars: Vec<Sidecar>,
    pub workload_entries: Vec<WorkloadEntry>,
    pub workload_groups: Vec<WorkloadGroup>,
    pub envoy_filters: Vec<EnvoyFilter>,
    pub validations: ValidationReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ConfigList {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: NamespaceRef {
                name: namespace.into(),
            },
            ..Default::default()
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace.name
    }

    /// Insert an object, rejecting it with a diagnostic when it is unnamed or
    /// belongs to another namespace
    pub fn push(&mut self, object: ConfigObject) -> Result<(), Diagnostic> {
        let kind = object.kind();
        if object.name().is_empty() {
            return Err(Diagnostic::for_kind(
                kind,
                Some(self.namespace()),
                "dropped object without a name",
            ));
        }
        if object.namespace() != self.namespace() {
            return Err(Diagnostic::for_kind(
                kind,
                Some(self.namespace()),
                format!(
                    "dropped {} from namespace '{}'",
                    object.name(),
                    object.namespace()
                ),
            ));
        }

        match object {
            ConfigObject::DestinationRule(o) => self.destination_rules.push(o),
            ConfigObject::VirtualService(o) => self.virtual_services.push(o),
            ConfigObject::Gateway(o) => self.gateways.push(o),
            ConfigObject::K8sGateway(o) => self.k8s_gateways.push(o),
            ConfigObject::K8sGRPCRoute(o) => self.k8s_grpc_routes.push(o),
            ConfigObject::K8sHTTPRoute(o) => self.k8s_http_routes.push(o),
            ConfigObject::K8sReferenceGrant(o) => self.k8s_reference_grants.push(o),
            ConfigObject::K8sTCPRoute(o) => self.k8s_tcp_routes.push(o),
            ConfigObject::K8sTLSRoute(o) => self.k8s_tls_routes.push(o),
            ConfigObject::PeerAuthentication(o) => self.peer_authentications.push(o),
            ConfigObject::RequestAuthentication(o) => self.request_authentications.push(o),
            ConfigObject::AuthorizationPolicy(o) => self.authorization_policies.push(o),
            ConfigObject::ServiceEntry(o) => self.service_entries.push(o),
            ConfigObject::Sidecar(o) => self.sidecars.push(o),
            ConfigObject::WorkloadEntry(o) => self.workload_entries.push(o),
            ConfigObject::WorkloadGroup(o) => self.workload_groups.push(o),
            ConfigObject::EnvoyFilter(o) => self.envoy_filters.push(o),
        }
        Ok(())
    }

    /// Insert an object, recording a diagnostic instead of failing
    pub fn push_or_record(&mut self, object: ConfigObject) {
        if let Err(diagnostic) = self.push(object) {
            tracing::warn!(%diagnostic, "Rejected config object");
            self.diagnostics.push(diagnostic);
        }
    }

    /// Borrowed views over one kind's sequence, in fetch order
    pub fn objects_of(&self, kind: ConfigKind) -> Vec<ConfigRef<'_>> {
        match kind {
            ConfigKind::DestinationRule => self.destination_rules.iter().map(ConfigRef::DestinationRule).collect(),
            ConfigKind::VirtualService => self.virtual_services.iter().map(ConfigRef::VirtualService).collect(),
            ConfigKind::Gateway => self.gateways.iter().map(ConfigRef::Gateway).collect(),
            ConfigKind::K8sGateway => self.k8s_gateways.iter().map(ConfigRef::K8sGateway).collect(),
            ConfigKind::K8sGRPCRoute => self.k8s_grpc_routes.iter().map(ConfigRef::K8sGRPCRoute).collect(),
            ConfigKind::K8sHTTPRoute => self.k8s_http_routes.iter().map(ConfigRef::K8sHTTPRoute).collect(),
            ConfigKind::K8sReferenceGrant => self.k8s_reference_grants.iter().map(ConfigRef::K8sReferenceGrant).collect(),
            ConfigKind::K8sTCPRoute => self.k8s_tcp_routes.iter().map(ConfigRef::K8sTCPRoute).collect(),
            ConfigKind::K8sTLSRoute => self.k8s_tls_routes.iter().map(ConfigRef::K8sTLSRoute).collect(),
            ConfigKind::PeerAuthentication => self.peer_authentications.iter().map(ConfigRef::PeerAuthentication).collect(),
            ConfigKind::RequestAuthentication => self.request_authentications.iter().map(ConfigRef::RequestAuthentication).collect(),
            ConfigKind::AuthorizationPolicy => self.authorization_policies.iter().map(ConfigRef::AuthorizationPolicy).collect(),
            ConfigKind::ServiceEntry => self.service_entries.iter().map(ConfigRef::ServiceEntry).collect(),
            ConfigKind::Sidecar => self.sidecars.iter().map(ConfigRef::Sidecar).collect(),
            ConfigKind::WorkloadEntry => self.workload_entries.iter().map(ConfigRef::WorkloadEntry).collect(),
            ConfigKind::WorkloadGroup => self.workload_groups.iter().map(ConfigRef::WorkloadGroup).collect(),
            ConfigKind::EnvoyFilter => self.envoy_filters.iter().map(ConfigRef::EnvoyFilter).collect(),
        }
    }

    /// Every object in kind order, each kind in fetch order
    pub fn objects(&self) -> Vec<ConfigRef<'_>> {
        ConfigKind::all()
            .iter()
            .flat_map(|kind| self.objects_of(*kind))
            .collect()
    }

    pub fn find(&self, kind: ConfigKind, name: &str) -> Option<ConfigRef<'_>> {
        self.objects_of(kind).into_iter().find(|obj| obj.name() == name)
    }

    pub fn count(&self, kind: ConfigKind) -> usize {
        self.objects_of(kind).len()
    }

    pub fn total(&self) -> usize {
        ConfigKind::all().iter().map(|kind| self.count(*kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vs(namespace: &str, name: &str) -> ConfigObject {
        ConfigObject::decode(
            ConfigKind::VirtualService,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "VirtualService",
                "metadata": {"name": name, "namespace": namespace},
                "spec": {"hosts": ["reviews"]}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_push_enforces_namespace() {
        let mut list = ConfigList::new("bookinfo");
        assert!(list.push(vs("bookinfo", "reviews")).is_ok());

        let err = list.push(vs("other", "reviews")).unwrap_err();
        assert_eq!(err.subject, "virtualservices");
        assert_eq!(list.count(ConfigKind::VirtualService), 1);
    }

    #[test]
    fn test_push_rejects_unnamed() {
        let mut list = ConfigList::new("bookinfo");
        list.push_or_record(vs("bookinfo", ""));
        assert!(list.is_empty());
        assert_eq!(list.diagnostics.len(), 1);
    }

    #[test]
    fn test_find_and_objects() {
        let mut list = ConfigList::new("bookinfo");
        list.push_or_record(vs("bookinfo", "reviews"));
        list.push_or_record(vs("bookinfo", "ratings"));

        assert!(list.find(ConfigKind::VirtualService, "ratings").is_some());
        assert!(list.find(ConfigKind::DestinationRule, "ratings").is_none());
        let names: Vec<&str> = list.objects().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["reviews", "ratings"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(ConfigList::new("bookinfo")).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(value["namespace"]["name"], "bookinfo");
        for key in [
            "virtualServices",
            "k8sGateways",
            "k8sGRPCRoutes",
            "k8sHTTPRoutes",
            "k8sReferenceGrants",
            "authorizationPolicies",
            "validations",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert!(!obj.contains_key("diagnostics"));
    }
}
