//! Mesh configuration kind definitions
//!
//! This module provides a centralized enum for every Istio and Gateway-API
//! resource kind the engine collects. It eliminates hardcoded strings
//! throughout the codebase and provides the API coordinates for each kind.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Enumeration of all supported mesh configuration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKind {
    // networking.istio.io
    DestinationRule,
    VirtualService,
    Gateway,
    // gateway.networking.k8s.io
    K8sGateway,
    K8sGRPCRoute,
    K8sHTTPRoute,
    K8sReferenceGrant,
    K8sTCPRoute,
    K8sTLSRoute,
    // security.istio.io
    PeerAuthentication,
    RequestAuthentication,
    AuthorizationPolicy,
    // networking.istio.io (workloads and proxies)
    ServiceEntry,
    Sidecar,
    WorkloadEntry,
    WorkloadGroup,
    EnvoyFilter,
}

const ALL_KINDS: &[ConfigKind] = &[
    ConfigKind::DestinationRule,
    ConfigKind::VirtualService,
    ConfigKind::Gateway,
    ConfigKind::K8sGateway,
    ConfigKind::K8sGRPCRoute,
    ConfigKind::K8sHTTPRoute,
    ConfigKind::K8sReferenceGrant,
    ConfigKind::K8sTCPRoute,
    ConfigKind::K8sTLSRoute,
    ConfigKind::PeerAuthentication,
    ConfigKind::RequestAuthentication,
    ConfigKind::AuthorizationPolicy,
    ConfigKind::ServiceEntry,
    ConfigKind::Sidecar,
    ConfigKind::WorkloadEntry,
    ConfigKind::WorkloadGroup,
    ConfigKind::EnvoyFilter,
];

impl ConfigKind {
    /// All supported kinds, in collection order
    pub fn all() -> &'static [Self] {
        ALL_KINDS
    }

    /// API group the kind is served from
    pub fn api_group(&self) -> &'static str {
        match self {
            ConfigKind::DestinationRule
            | ConfigKind::VirtualService
            | ConfigKind::Gateway
            | ConfigKind::ServiceEntry
            | ConfigKind::Sidecar
            | ConfigKind::WorkloadEntry
            | ConfigKind::WorkloadGroup
            | ConfigKind::EnvoyFilter => "networking.istio.io",
            ConfigKind::PeerAuthentication
            | ConfigKind::RequestAuthentication
            | ConfigKind::AuthorizationPolicy => "security.istio.io",
            ConfigKind::K8sGateway
            | ConfigKind::K8sGRPCRoute
            | ConfigKind::K8sHTTPRoute
            | ConfigKind::K8sReferenceGrant
            | ConfigKind::K8sTCPRoute
            | ConfigKind::K8sTLSRoute => "gateway.networking.k8s.io",
        }
    }

    /// API version requested from the cluster
    pub fn api_version(&self) -> &'static str {
        match self {
            ConfigKind::EnvoyFilter => "v1alpha3",
            ConfigKind::K8sReferenceGrant => "v1beta1",
            ConfigKind::K8sTCPRoute | ConfigKind::K8sTLSRoute => "v1alpha2",
            _ => "v1",
        }
    }

    /// Versions to try, newest first, when the preferred one is not served
    pub fn api_versions(&self) -> &'static [&'static str] {
        match self {
            ConfigKind::EnvoyFilter => &["v1alpha3"],
            ConfigKind::K8sReferenceGrant => &["v1beta1", "v1alpha2"],
            ConfigKind::K8sTCPRoute | ConfigKind::K8sTLSRoute => &["v1alpha2"],
            ConfigKind::K8sGateway | ConfigKind::K8sHTTPRoute | ConfigKind::K8sGRPCRoute => {
                &["v1", "v1beta1"]
            }
            ConfigKind::PeerAuthentication
            | ConfigKind::RequestAuthentication
            | ConfigKind::AuthorizationPolicy => &["v1", "v1beta1"],
            _ => &["v1", "v1beta1", "v1alpha3"],
        }
    }

    /// Kubernetes `kind` field value
    pub fn kind_str(&self) -> &'static str {
        match self {
            ConfigKind::DestinationRule => "DestinationRule",
            ConfigKind::VirtualService => "VirtualService",
            ConfigKind::Gateway | ConfigKind::K8sGateway => "Gateway",
            ConfigKind::K8sGRPCRoute => "GRPCRoute",
            ConfigKind::K8sHTTPRoute => "HTTPRoute",
            ConfigKind::K8sReferenceGrant => "ReferenceGrant",
            ConfigKind::K8sTCPRoute => "TCPRoute",
            ConfigKind::K8sTLSRoute => "TLSRoute",
            ConfigKind::PeerAuthentication => "PeerAuthentication",
            ConfigKind::RequestAuthentication => "RequestAuthentication",
            ConfigKind::AuthorizationPolicy => "AuthorizationPolicy",
            ConfigKind::ServiceEntry => "ServiceEntry",
            ConfigKind::Sidecar => "Sidecar",
            ConfigKind::WorkloadEntry => "WorkloadEntry",
            ConfigKind::WorkloadGroup => "WorkloadGroup",
            ConfigKind::EnvoyFilter => "EnvoyFilter",
        }
    }

    /// Plural resource name as served by the API server
    pub fn api_plural(&self) -> &'static str {
        match self {
            ConfigKind::DestinationRule => "destinationrules",
            ConfigKind::VirtualService => "virtualservices",
            ConfigKind::Gateway | ConfigKind::K8sGateway => "gateways",
            ConfigKind::K8sGRPCRoute => "grpcroutes",
            ConfigKind::K8sHTTPRoute => "httproutes",
            ConfigKind::K8sReferenceGrant => "referencegrants",
            ConfigKind::K8sTCPRoute => "tcproutes",
            ConfigKind::K8sTLSRoute => "tlsroutes",
            ConfigKind::PeerAuthentication => "peerauthentications",
            ConfigKind::RequestAuthentication => "requestauthentications",
            ConfigKind::AuthorizationPolicy => "authorizationpolicies",
            ConfigKind::ServiceEntry => "serviceentries",
            ConfigKind::Sidecar => "sidecars",
            ConfigKind::WorkloadEntry => "workloadentries",
            ConfigKind::WorkloadGroup => "workloadgroups",
            ConfigKind::EnvoyFilter => "envoyfilters",
        }
    }

    /// Lower-case singular name used as the validation object type
    pub fn object_type(&self) -> &'static str {
        match self {
            ConfigKind::DestinationRule => "destinationrule",
            ConfigKind::VirtualService => "virtualservice",
            ConfigKind::Gateway => "gateway",
            ConfigKind::K8sGateway => "k8sgateway",
            ConfigKind::K8sGRPCRoute => "k8sgrpcroute",
            ConfigKind::K8sHTTPRoute => "k8shttproute",
            ConfigKind::K8sReferenceGrant => "k8sreferencegrant",
            ConfigKind::K8sTCPRoute => "k8stcproute",
            ConfigKind::K8sTLSRoute => "k8stlsroute",
            ConfigKind::PeerAuthentication => "peerauthentication",
            ConfigKind::RequestAuthentication => "requestauthentication",
            ConfigKind::AuthorizationPolicy => "authorizationpolicy",
            ConfigKind::ServiceEntry => "serviceentry",
            ConfigKind::Sidecar => "sidecar",
            ConfigKind::WorkloadEntry => "workloadentry",
            ConfigKind::WorkloadGroup => "workloadgroup",
            ConfigKind::EnvoyFilter => "envoyfilter",
        }
    }

    /// Lower-case plural name used as the permission and API-path key
    pub fn resource_name(&self) -> &'static str {
        match self {
            ConfigKind::K8sGateway => "k8sgateways",
            ConfigKind::K8sGRPCRoute => "k8sgrpcroutes",
            ConfigKind::K8sHTTPRoute => "k8shttproutes",
            ConfigKind::K8sReferenceGrant => "k8sreferencegrants",
            ConfigKind::K8sTCPRoute => "k8stcproutes",
            ConfigKind::K8sTLSRoute => "k8stlsroutes",
            other => other.api_plural(),
        }
    }

    /// Whether this is one of the Gateway-API route kinds
    pub fn is_k8s_route(&self) -> bool {
        matches!(
            self,
            ConfigKind::K8sGRPCRoute
                | ConfigKind::K8sHTTPRoute
                | ConfigKind::K8sTCPRoute
                | ConfigKind::K8sTLSRoute
        )
    }

    /// Try to parse a string into a ConfigKind, returning None if invalid
    pub fn parse_optional(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_name())
    }
}

impl FromStr for ConfigKind {
    type Err = String;

    /// Case-insensitive; accepts the object type, the resource name and the
    /// Kubernetes kind (Gateway resolves to the Istio gateway).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.object_type() == lower || kind.resource_name() == lower)
            .or_else(|| {
                ALL_KINDS
                    .iter()
                    .copied()
                    .find(|kind| kind.kind_str().to_lowercase() == lower)
            })
            .ok_or_else(|| format!("Unknown config kind: {}", s))
    }
}

impl Serialize for ConfigKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.resource_name())
    }
}

impl<'de> Deserialize<'de> for ConfigKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_are_unique() {
        let mut names: Vec<&str> = ConfigKind::all().iter().map(|k| k.resource_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ConfigKind::all().len());
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(
            ConfigKind::parse_optional("virtualservices"),
            Some(ConfigKind::VirtualService)
        );
        assert_eq!(
            ConfigKind::parse_optional("VirtualService"),
            Some(ConfigKind::VirtualService)
        );
        assert_eq!(
            ConfigKind::parse_optional("k8shttproute"),
            Some(ConfigKind::K8sHTTPRoute)
        );
        assert_eq!(ConfigKind::parse_optional("gateway"), Some(ConfigKind::Gateway));
        assert_eq!(
            ConfigKind::parse_optional("k8sgateways"),
            Some(ConfigKind::K8sGateway)
        );
        assert_eq!(ConfigKind::parse_optional("httproute"), Some(ConfigKind::K8sHTTPRoute));
        assert_eq!(ConfigKind::parse_optional("Unknown"), None);
    }

    #[test]
    fn test_istio_and_k8s_gateway_share_api_plural() {
        assert_eq!(ConfigKind::Gateway.api_plural(), "gateways");
        assert_eq!(ConfigKind::K8sGateway.api_plural(), "gateways");
        assert_ne!(
            ConfigKind::Gateway.api_group(),
            ConfigKind::K8sGateway.api_group()
        );
    }

    #[test]
    fn test_preferred_version_is_tried_first() {
        for kind in ConfigKind::all() {
            assert_eq!(kind.api_versions()[0], kind.api_version(), "{}", kind);
        }
    }

    #[test]
    fn test_display_uses_resource_name() {
        assert_eq!(
            format!("{}", ConfigKind::AuthorizationPolicy),
            "authorizationpolicies"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&ConfigKind::K8sTLSRoute).unwrap();
        assert_eq!(json, "\"k8stlsroutes\"");
        let kind: ConfigKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, ConfigKind::K8sTLSRoute);
    }
}
