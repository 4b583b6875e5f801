//! Generic handle over the heterogeneous config kinds
//!
//! `ConfigObject` owns a typed payload, `ConfigRef` borrows one out of a
//! `ConfigList`. Both are generated from the same kind table so that every
//! match over them stays exhaustive.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::ConfigKind;
use super::gateway_api::{GRPCRoute, HTTPRoute, ReferenceGrant, TCPRoute, TLSRoute};
use super::istio::{
    AuthorizationPolicy, DestinationRule, EnvoyFilter, PeerAuthentication, RequestAuthentication,
    ServiceEntry, Sidecar, VirtualService, WorkloadEntry, WorkloadGroup,
};
use super::{IstioGateway, K8sGatewayResource};

/// Identity of a config object: (kind, namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectKey {
    pub kind: ConfigKind,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ConfigKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.object_type(), self.namespace, self.name)
    }
}

macro_rules! config_objects {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A config object of any supported kind
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum ConfigObject {
            $($variant($ty)),*
        }

        /// Borrowed view of a config object held by a `ConfigList`
        #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum ConfigRef<'a> {
            $($variant(&'a $ty)),*
        }

        impl ConfigObject {
            pub fn kind(&self) -> ConfigKind {
                match self {
                    $(ConfigObject::$variant(_) => ConfigKind::$variant),*
                }
            }

            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(ConfigObject::$variant(obj) => &obj.metadata),*
                }
            }

            pub fn view(&self) -> ConfigRef<'_> {
                match self {
                    $(ConfigObject::$variant(obj) => ConfigRef::$variant(obj)),*
                }
            }

            /// Decode a raw API object into the typed payload for `kind`
            pub fn decode(kind: ConfigKind, mut value: Value) -> Result<Self, serde_json::Error> {
                // Empty specs are sometimes dropped by the API server
                if let Some(obj) = value.as_object_mut() {
                    obj.entry("spec").or_insert_with(|| Value::Object(Default::default()));
                }
                match kind {
                    $(ConfigKind::$variant => serde_json::from_value(value).map(ConfigObject::$variant)),*
                }
            }
        }

        impl<'a> ConfigRef<'a> {
            pub fn kind(&self) -> ConfigKind {
                match self {
                    $(ConfigRef::$variant(_) => ConfigKind::$variant),*
                }
            }

            pub fn metadata(&self) -> &'a ObjectMeta {
                match *self {
                    $(ConfigRef::$variant(obj) => &obj.metadata),*
                }
            }

            pub fn to_owned_object(&self) -> ConfigObject {
                match *self {
                    $(ConfigRef::$variant(obj) => ConfigObject::$variant(obj.clone())),*
                }
            }
        }
    };
}

config_objects! {
    DestinationRule => DestinationRule,
    VirtualService => VirtualService,
    Gateway => IstioGateway,
    K8sGateway => K8sGatewayResource,
    K8sGRPCRoute => GRPCRoute,
    K8sHTTPRoute => HTTPRoute,
    K8sReferenceGrant => ReferenceGrant,
    K8sTCPRoute => TCPRoute,
    K8sTLSRoute => TLSRoute,
    PeerAuthentication => PeerAuthentication,
    RequestAuthentication => RequestAuthentication,
    AuthorizationPolicy => AuthorizationPolicy,
    ServiceEntry => ServiceEntry,
    Sidecar => Sidecar,
    WorkloadEntry => WorkloadEntry,
    WorkloadGroup => WorkloadGroup,
    EnvoyFilter => EnvoyFilter,
}

impl ConfigObject {
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.namespace(), self.name())
    }
}

impl<'a> ConfigRef<'a> {
    pub fn name(&self) -> &'a str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &'a str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind(), self.namespace(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_dispatches_on_kind() {
        let obj = ConfigObject::decode(
            ConfigKind::K8sGateway,
            json!({
                "apiVersion": "gateway.networking.k8s.io/v1",
                "kind": "Gateway",
                "metadata": {"name": "gw", "namespace": "bookinfo"},
                "spec": {
                    "gatewayClassName": "istio",
                    "listeners": [{"name": "http", "port": 80, "protocol": "HTTP"}]
                }
            }),
        )
        .unwrap();

        assert_eq!(obj.kind(), ConfigKind::K8sGateway);
        assert_eq!(obj.key(), ObjectKey::new(ConfigKind::K8sGateway, "bookinfo", "gw"));
        match obj {
            ConfigObject::K8sGateway(gw) => assert_eq!(gw.spec.listeners[0].port, 80),
            other => panic!("unexpected variant {:?}", other.kind()),
        }
    }

    #[test]
    fn test_decode_tolerates_missing_spec() {
        let obj = ConfigObject::decode(
            ConfigKind::PeerAuthentication,
            json!({
                "apiVersion": "security.istio.io/v1",
                "kind": "PeerAuthentication",
                "metadata": {"name": "default", "namespace": "bookinfo"}
            }),
        )
        .unwrap();
        assert_eq!(obj.name(), "default");
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let result = ConfigObject::decode(
            ConfigKind::VirtualService,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "VirtualService",
                "metadata": {"name": "bad", "namespace": "bookinfo"},
                "spec": {"hosts": "not-a-list"}
            }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_view_round_trip() {
        let obj = ConfigObject::decode(
            ConfigKind::Sidecar,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "Sidecar",
                "metadata": {"name": "default", "namespace": "bookinfo"},
                "spec": {"egress": [{"hosts": ["./*"]}]}
            }),
        )
        .unwrap();
        assert_eq!(obj.view().to_owned_object(), obj);
        assert_eq!(obj.view().key(), obj.key());
    }
}
