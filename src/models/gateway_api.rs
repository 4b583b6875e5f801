//! Kubernetes Gateway-API resource models
//!
//! Same approach as the Istio models: typed fields for what the resolver and
//! rules read, everything else preserved in `extra`.

use super::istio::Extra;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub port: u32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_routes: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "Gateway",
    plural = "gateways",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    #[serde(default)]
    pub gateway_class_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<Listener>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Reference from a route to the gateway it attaches to
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
}

impl ParentReference {
    /// Parent refs default to `gateway.networking.k8s.io/Gateway`
    pub fn targets_gateway(&self) -> bool {
        let group_ok = self
            .group
            .as_deref()
            .is_none_or(|g| g == "gateway.networking.k8s.io");
        let kind_ok = self.kind.as_deref().is_none_or(|k| k == "Gateway");
        group_ok && kind_ok
    }
}

/// Reference from a route rule to a backend
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl BackendRef {
    /// Backend refs default to a core `Service`
    pub fn targets_service(&self) -> bool {
        let group_ok = self.group.as_deref().is_none_or(str::is_empty);
        let kind_ok = self.kind.as_deref().is_none_or(|k| k == "Service");
        group_ok && kind_ok
    }
}

/// Route rule shared by the HTTP, GRPC, TCP and TLS route kinds
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_refs: Vec<BackendRef>,
    #[serde(flatten)]
    pub extra: Extra,
}

macro_rules! route_spec {
    ($spec:ident, $kind:literal, $plural:literal, $version:literal) => {
        #[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
        #[kube(
            group = "gateway.networking.k8s.io",
            version = $version,
            kind = $kind,
            plural = $plural,
            namespaced,
            schema = "disabled",
            derive = "PartialEq"
        )]
        #[serde(rename_all = "camelCase")]
        pub struct $spec {
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub parent_refs: Vec<ParentReference>,
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub hostnames: Vec<String>,
            #[serde(default, skip_serializing_if = "Vec::is_empty")]
            pub rules: Vec<RouteRule>,
            #[serde(flatten)]
            pub extra: Extra,
        }
    };
}

route_spec!(HTTPRouteSpec, "HTTPRoute", "httproutes", "v1");
route_spec!(GRPCRouteSpec, "GRPCRoute", "grpcroutes", "v1");
route_spec!(TCPRouteSpec, "TCPRoute", "tcproutes", "v1alpha2");
route_spec!(TLSRouteSpec, "TLSRoute", "tlsroutes", "v1alpha2");

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReferenceGrantFrom {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub namespace: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ReferenceGrantTo {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "ReferenceGrant",
    plural = "referencegrants",
    namespaced,
    schema = "disabled",
    derive = "PartialEq"
)]
pub struct ReferenceGrantSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<ReferenceGrantFrom>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<ReferenceGrantTo>,
}

impl ReferenceGrantSpec {
    /// Whether a `kind` route in `from_namespace` may reference `service_name`
    pub fn allows(&self, route_kind: &str, from_namespace: &str, service_name: &str) -> bool {
        let from_ok = self.from.iter().any(|from| {
            from.group == "gateway.networking.k8s.io"
                && from.kind == route_kind
                && from.namespace == from_namespace
        });
        let to_ok = self.to.iter().any(|to| {
            to.group.is_empty()
                && to.kind == "Service"
                && to.name.as_deref().is_none_or(|name| name == service_name)
        });
        from_ok && to_ok
    }
}
