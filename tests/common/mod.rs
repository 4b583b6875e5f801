//! In-memory fixture cluster shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use meshcfg::kube::{ClusterApi, ListQuery, Scope};
use meshcfg::models::{ConfigKind, ServiceInfo, Verb, Workload};
use meshcfg::{ApiError, ConfigService, EngineOptions};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ObjectId = (ConfigKind, String, String);

#[derive(Default)]
struct Inner {
    namespaces: BTreeSet<String>,
    objects: BTreeMap<ObjectId, Value>,
    services: Vec<ServiceInfo>,
    workloads: Vec<Workload>,
    failing: BTreeSet<ConfigKind>,
    hanging: BTreeSet<ConfigKind>,
    denied: BTreeSet<ConfigKind>,
}

/// A cluster held in memory; objects are applied and deleted like fixtures
#[derive(Clone, Default)]
pub struct FixtureCluster {
    inner: Arc<Mutex<Inner>>,
}

impl FixtureCluster {
    pub fn new(namespaces: &[&str]) -> Self {
        let cluster = Self::default();
        {
            let mut inner = cluster.inner.lock().unwrap();
            inner.namespaces = namespaces.iter().map(|ns| ns.to_string()).collect();
        }
        cluster
    }

    /// Store an object, replacing any previous one with the same identity
    pub fn apply(&self, object: Value) -> &Self {
        let kind = kind_of(&object);
        let namespace = object["metadata"]["namespace"].as_str().unwrap_or_default().to_string();
        let name = object["metadata"]["name"].as_str().unwrap_or_default().to_string();
        self.inner.lock().unwrap().objects.insert((kind, namespace, name), object);
        self
    }

    pub fn delete(&self, kind: ConfigKind, namespace: &str, name: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .objects
            .remove(&(kind, namespace.to_string(), name.to_string()));
        self
    }

    pub fn service(&self, namespace: &str, name: &str) -> &Self {
        self.inner.lock().unwrap().services.push(ServiceInfo {
            namespace: namespace.into(),
            name: name.into(),
        });
        self
    }

    pub fn workload(&self, namespace: &str, name: &str, labels: &[(&str, &str)]) -> &Self {
        self.inner.lock().unwrap().workloads.push(Workload {
            namespace: namespace.into(),
            name: name.into(),
            kind: "Deployment".into(),
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        });
        self
    }

    /// Lists of `kind` fail with an unavailable error
    pub fn fail_kind(&self, kind: ConfigKind) -> &Self {
        self.inner.lock().unwrap().failing.insert(kind);
        self
    }

    /// Lists and reads of `kind` never complete
    pub fn hang_kind(&self, kind: ConfigKind) -> &Self {
        self.inner.lock().unwrap().hanging.insert(kind);
        self
    }

    /// Access checks on `kind` are forbidden
    pub fn deny_kind(&self, kind: ConfigKind) -> &Self {
        self.inner.lock().unwrap().denied.insert(kind);
        self
    }

    pub fn config_service(&self) -> ConfigService {
        self.config_service_with(EngineOptions::default())
    }

    pub fn config_service_with(&self, options: EngineOptions) -> ConfigService {
        ConfigService::new(Arc::new(self.clone()), options)
    }

    pub fn with_timeout(&self, timeout: Duration) -> ConfigService {
        self.config_service_with(EngineOptions {
            request_timeout: timeout,
            ..Default::default()
        })
    }
}

fn kind_of(object: &Value) -> ConfigKind {
    let group = object["apiVersion"]
        .as_str()
        .and_then(|v| v.split('/').next())
        .unwrap_or_default();
    let kind = object["kind"].as_str().unwrap_or_default();
    ConfigKind::all()
        .iter()
        .copied()
        .find(|k| k.kind_str() == kind && k.api_group() == group)
        .unwrap_or_else(|| panic!("fixture of unsupported kind {}/{}", group, kind))
}

fn in_scope(scope: &Scope, namespace: &str) -> bool {
    scope.namespace().is_none_or(|ns| ns == namespace)
}

fn selected(object: &Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').filter(|s| !s.is_empty()).all(|term| {
        let (key, value) = term.split_once('=').unwrap_or((term, ""));
        object["metadata"]["labels"][key.trim()].as_str() == Some(value.trim())
    })
}

#[async_trait]
impl ClusterApi for FixtureCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ApiError> {
        Ok(self.inner.lock().unwrap().namespaces.contains(namespace))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.inner.lock().unwrap().namespaces.iter().cloned().collect())
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, ApiError> {
        let result = {
            let inner = self.inner.lock().unwrap();
            if inner.hanging.contains(&query.kind) {
                None
            } else if inner.failing.contains(&query.kind) {
                Some(Err(ApiError::Unavailable(format!("{} unavailable", query.kind))))
            } else {
                Some(Ok(inner
                    .objects
                    .iter()
                    .filter(|((kind, ns, _), object)| {
                        *kind == query.kind
                            && in_scope(&query.scope, ns)
                            && selected(object, query.label_selector.as_deref())
                    })
                    .map(|(_, object)| object.clone())
                    .collect()))
            }
        };
        match result {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn get(&self, kind: ConfigKind, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let result = {
            let inner = self.inner.lock().unwrap();
            if inner.hanging.contains(&kind) {
                None
            } else {
                Some(
                    inner
                        .objects
                        .get(&(kind, namespace.to_string(), name.to_string()))
                        .cloned()
                        .ok_or_else(|| ApiError::NotFound(format!("{} {}/{}", kind, namespace, name))),
                )
            }
        };
        match result {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn list_services(&self, scope: &Scope) -> Result<Vec<ServiceInfo>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .services
            .iter()
            .filter(|s| in_scope(scope, &s.namespace))
            .cloned()
            .collect())
    }

    async fn list_workloads(&self, scope: &Scope) -> Result<Vec<Workload>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .workloads
            .iter()
            .filter(|w| in_scope(scope, &w.namespace))
            .cloned()
            .collect())
    }

    async fn can_i(&self, _namespace: &str, kind: ConfigKind, _verb: Verb) -> Result<bool, ApiError> {
        if self.inner.lock().unwrap().denied.contains(&kind) {
            return Err(ApiError::Forbidden(format!("{} denied", kind)));
        }
        Ok(true)
    }
}

/// The bookinfo sample: services, workloads, an ingress gateway and routing
pub fn bookinfo() -> FixtureCluster {
    let cluster = FixtureCluster::new(&["bookinfo", "istio-system"]);
    for svc in ["productpage", "reviews", "ratings", "details"] {
        cluster
            .service("bookinfo", svc)
            .workload("bookinfo", &format!("{}-v1", svc), &[("app", svc), ("version", "v1")]);
    }
    cluster
        .workload("bookinfo", "reviews-v2", &[("app", "reviews"), ("version", "v2")])
        .service("istio-system", "istio-ingressgateway")
        .workload("istio-system", "istio-ingressgateway", &[("istio", "ingressgateway")]);

    cluster
        .apply(json!({
            "apiVersion": "networking.istio.io/v1",
            "kind": "Gateway",
            "metadata": {"name": "bookinfo-gateway", "namespace": "bookinfo"},
            "spec": {
                "selector": {"istio": "ingressgateway"},
                "servers": [{"port": {"number": 8080, "name": "http", "protocol": "HTTP"}, "hosts": ["*"]}]
            }
        }))
        .apply(json!({
            "apiVersion": "networking.istio.io/v1",
            "kind": "VirtualService",
            "metadata": {"name": "bookinfo", "namespace": "bookinfo"},
            "spec": {
                "hosts": ["*"],
                "gateways": ["bookinfo-gateway"],
                "http": [{"route": [{"destination": {"host": "productpage", "port": {"number": 9080}}}]}]
            }
        }))
        .apply(json!({
            "apiVersion": "networking.istio.io/v1",
            "kind": "DestinationRule",
            "metadata": {"name": "reviews", "namespace": "bookinfo"},
            "spec": {
                "host": "reviews",
                "subsets": [
                    {"name": "v1", "labels": {"version": "v1"}},
                    {"name": "v2", "labels": {"version": "v2"}}
                ]
            }
        }))
        .apply(json!({
            "apiVersion": "networking.istio.io/v1",
            "kind": "VirtualService",
            "metadata": {"name": "reviews", "namespace": "bookinfo"},
            "spec": {
                "hosts": ["reviews"],
                "http": [{"route": [
                    {"destination": {"host": "reviews", "subset": "v1"}, "weight": 80},
                    {"destination": {"host": "reviews", "subset": "v2"}, "weight": 20}
                ]}]
            }
        }))
        .apply(json!({
            "apiVersion": "security.istio.io/v1",
            "kind": "AuthorizationPolicy",
            "metadata": {"name": "allow-productpage", "namespace": "bookinfo"},
            "spec": {
                "selector": {"matchLabels": {"app": "productpage"}},
                "rules": [{"from": [{"source": {"namespaces": ["istio-system"]}}]}]
            }
        }));
    cluster
}

/// A Gateway-API gateway in `namespace`
pub fn k8s_gateway(namespace: &str, name: &str) -> Value {
    json!({
        "apiVersion": "gateway.networking.k8s.io/v1",
        "kind": "Gateway",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {
            "gatewayClassName": "istio",
            "listeners": [{"name": "http", "hostname": "bookinfo.example.com", "port": 80, "protocol": "HTTP"}]
        }
    })
}
