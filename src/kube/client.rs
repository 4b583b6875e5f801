//! Cluster API seam
//!
//! The engine only talks to the cluster through [`ClusterApi`]. The kube-rs
//! backed [`KubeClusterApi`] serves CRDs through `Api<DynamicObject>` and the
//! core resources through their typed k8s-openapi APIs.

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::{ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::{Api, Client, Resource};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::ApiError;
use crate::models::{ConfigKind, ServiceInfo, Verb, Workload};

/// Namespace scope of a list call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Namespace(String),
    All,
}

impl Scope {
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Scope::Namespace(ns) => Some(ns),
            Scope::All => None,
        }
    }
}

/// A list request for one config kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: ConfigKind,
    pub scope: Scope,
    pub label_selector: Option<String>,
}

impl ListQuery {
    pub fn new(kind: ConfigKind, scope: Scope) -> Self {
        Self {
            kind,
            scope,
            label_selector: None,
        }
    }

    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.label_selector = selector;
        self
    }
}

/// Read access to the cluster state the engine consumes
///
/// Config objects are returned as raw JSON; decoding into typed payloads is
/// left to the collector so that one malformed object degrades only its kind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ApiError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, ApiError>;

    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, ApiError>;

    async fn get(&self, kind: ConfigKind, namespace: &str, name: &str)
    -> Result<Value, ApiError>;

    async fn list_services(&self, scope: &Scope) -> Result<Vec<ServiceInfo>, ApiError>;

    async fn list_workloads(&self, scope: &Scope) -> Result<Vec<Workload>, ApiError>;

    async fn can_i(&self, namespace: &str, kind: ConfigKind, verb: Verb)
    -> Result<bool, ApiError>;
}

/// `ClusterApi` backed by a kube-rs client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn dynamic_api(&self, kind: ConfigKind, version: &str, namespace: Option<&str>) -> Api<DynamicObject> {
        let api_resource = api_resource(kind, version);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &api_resource),
            None => Api::all_with(self.client.clone(), &api_resource),
        }
    }
}

/// ApiResource for a kind at a specific version
pub fn api_resource(kind: ConfigKind, version: &str) -> ApiResource {
    let group = kind.api_group();
    ApiResource {
        group: group.to_string(),
        version: version.to_string(),
        api_version: format!("{}/{}", group, version),
        kind: kind.kind_str().to_string(),
        plural: kind.api_plural().to_string(),
    }
}

fn scoped_api<K>(client: &Client, scope: &Scope) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match scope {
        Scope::Namespace(ns) => Api::namespaced(client.clone(), ns),
        Scope::All => Api::all(client.clone()),
    }
}

/// Serialize a dynamic object, restoring the type meta list items may omit
fn to_value(obj: &DynamicObject, kind: ConfigKind, version: &str) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(obj)
        .map_err(|e| ApiError::Unavailable(format!("Failed to encode {}: {}", kind, e)))?;
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(format!("{}/{}", kind.api_group(), version)));
        map.entry("kind")
            .or_insert_with(|| Value::String(kind.kind_str().to_string()));
    }
    Ok(value)
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ApiError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(namespace).await?.is_some())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ApiError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, ApiError> {
        let mut params = ListParams::default();
        if let Some(selector) = &query.label_selector {
            params = params.labels(selector);
        }

        // Fall back to older served versions when the preferred one 404s
        let mut last_err = ApiError::NotFound(format!("{} is not served", query.kind));
        for version in query.kind.api_versions() {
            let api = self.dynamic_api(query.kind, version, query.scope.namespace());
            match api.list(&params).await {
                Ok(list) => {
                    tracing::debug!(
                        kind = %query.kind,
                        version,
                        count = list.items.len(),
                        "Listed config objects"
                    );
                    return list
                        .items
                        .iter()
                        .map(|obj| to_value(obj, query.kind, version))
                        .collect();
                }
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    tracing::debug!(kind = %query.kind, version, "Version not served");
                    last_err = ApiError::NotFound(ae.message);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err)
    }

    async fn get(&self, kind: ConfigKind, namespace: &str, name: &str) -> Result<Value, ApiError> {
        let mut last_err = ApiError::NotFound(format!("{} {}/{}", kind, namespace, name));
        for version in kind.api_versions() {
            let api = self.dynamic_api(kind, version, Some(namespace));
            match api.get(name).await {
                Ok(obj) => return to_value(&obj, kind, version),
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    last_err = ApiError::NotFound(ae.message);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last_err)
    }

    async fn list_services(&self, scope: &Scope) -> Result<Vec<ServiceInfo>, ApiError> {
        let api: Api<Service> = scoped_api(&self.client, scope);
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|svc| ServiceInfo {
                namespace: svc.metadata.namespace.unwrap_or_default(),
                name: svc.metadata.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_workloads(&self, scope: &Scope) -> Result<Vec<Workload>, ApiError> {
        let api: Api<Pod> = scoped_api(&self.client, scope);
        let pods = api.list(&ListParams::default()).await?;
        Ok(workloads_from_pods(pods.items))
    }

    async fn can_i(&self, namespace: &str, kind: ConfigKind, verb: Verb) -> Result<bool, ApiError> {
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    group: Some(kind.api_group().to_string()),
                    resource: Some(kind.api_plural().to_string()),
                    verb: Some(verb.as_str().to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let created = api.create(&PostParams::default(), &review).await?;
        Ok(created.status.map(|s| s.allowed).unwrap_or(false))
    }
}

/// Labels stamped on single pods by their controllers
const POD_SPECIFIC_LABELS: &[&str] = &[
    "pod-template-hash",
    "controller-revision-hash",
    "statefulset.kubernetes.io/pod-name",
    "apps.kubernetes.io/pod-index",
    "batch.kubernetes.io/controller-uid",
    "batch.kubernetes.io/job-name",
    "controller-uid",
    "job-name",
];

/// Group pods into one workload per owning controller
///
/// Pods owned by a ReplicaSet are attributed to its Deployment when the
/// ReplicaSet name carries the pod template hash. Bare pods are their own
/// workload. A workload keeps the labels shared by all of its pods.
pub(crate) fn workloads_from_pods(pods: Vec<Pod>) -> Vec<Workload> {
    let mut grouped: BTreeMap<(String, String, String), BTreeMap<String, String>> = BTreeMap::new();

    for pod in pods {
        let meta = pod.metadata;
        let namespace = meta.namespace.unwrap_or_default();
        let mut labels = meta.labels.unwrap_or_default();
        let controller = meta
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .find(|owner| owner.controller == Some(true));

        let (kind, name) = match controller {
            Some(owner) if owner.kind == "ReplicaSet" => {
                let deployment = labels
                    .get("pod-template-hash")
                    .and_then(|hash| owner.name.strip_suffix(&format!("-{}", hash)))
                    .map(str::to_string);
                match deployment {
                    Some(deployment) => ("Deployment".to_string(), deployment),
                    None => (owner.kind, owner.name),
                }
            }
            Some(owner) => (owner.kind, owner.name),
            None => ("Pod".to_string(), meta.name.unwrap_or_default()),
        };
        labels.retain(|key, _| !POD_SPECIFIC_LABELS.iter().any(|label| *label == key.as_str()));

        match grouped.entry((namespace, kind, name)) {
            Entry::Occupied(mut shared) => {
                shared.get_mut().retain(|k, v| labels.get(k) == Some(v));
            }
            Entry::Vacant(slot) => {
                slot.insert(labels);
            }
        }
    }

    grouped
        .into_iter()
        .map(|((namespace, kind, name), labels)| Workload {
            namespace,
            name,
            kind,
            labels,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_resource_coordinates() {
        let ar = api_resource(ConfigKind::K8sHTTPRoute, "v1");
        assert_eq!(ar.api_version, "gateway.networking.k8s.io/v1");
        assert_eq!(ar.kind, "HTTPRoute");
        assert_eq!(ar.plural, "httproutes");

        let ar = api_resource(ConfigKind::EnvoyFilter, "v1alpha3");
        assert_eq!(ar.api_version, "networking.istio.io/v1alpha3");
    }

    #[test]
    fn test_list_query_builder() {
        let query = ListQuery::new(ConfigKind::Sidecar, Scope::Namespace("bookinfo".into()))
            .with_selector(Some("app=reviews".into()));
        assert_eq!(query.scope.namespace(), Some("bookinfo"));
        assert_eq!(query.label_selector.as_deref(), Some("app=reviews"));
        assert_eq!(Scope::All.namespace(), None);
    }

    fn pod(namespace: &str, name: &str, labels: &[(&str, &str)], owner: Option<(&str, &str)>) -> Pod {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": labels.iter().cloned().collect::<BTreeMap<_, _>>(),
                "ownerReferences": owner.map(|(kind, name)| vec![serde_json::json!({
                    "apiVersion": "apps/v1",
                    "kind": kind,
                    "name": name,
                    "uid": "0",
                    "controller": true
                })]).unwrap_or_default()
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_pods_group_into_controllers() {
        let workloads = workloads_from_pods(vec![
            pod(
                "bookinfo",
                "reviews-v1-7d9c-abcde",
                &[("app", "reviews"), ("version", "v1"), ("pod-template-hash", "7d9c")],
                Some(("ReplicaSet", "reviews-v1-7d9c")),
            ),
            pod(
                "bookinfo",
                "reviews-v1-7d9c-fghij",
                &[("app", "reviews"), ("version", "v1"), ("pod-template-hash", "7d9c")],
                Some(("ReplicaSet", "reviews-v1-7d9c")),
            ),
            pod("bookinfo", "ghost", &[("app", "ghost")], None),
            pod(
                "bookinfo",
                "migrate-x1",
                &[("app", "migrate"), ("job-name", "migrate")],
                Some(("Job", "migrate")),
            ),
        ]);

        let names: Vec<(&str, &str)> = workloads
            .iter()
            .map(|w| (w.kind.as_str(), w.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Deployment", "reviews-v1"), ("Job", "migrate"), ("Pod", "ghost")]
        );
        assert_eq!(
            workloads[0].labels,
            BTreeMap::from([
                ("app".to_string(), "reviews".to_string()),
                ("version".to_string(), "v1".to_string()),
            ])
        );
        assert!(workloads[2].matches(&BTreeMap::from([("app".to_string(), "ghost".to_string())])));
    }

    #[test]
    fn test_workload_keeps_labels_shared_by_its_pods() {
        let workloads = workloads_from_pods(vec![
            pod(
                "db",
                "mongo-0",
                &[("app", "mongo"), ("statefulset.kubernetes.io/pod-name", "mongo-0"), ("role", "primary")],
                Some(("StatefulSet", "mongo")),
            ),
            pod(
                "db",
                "mongo-1",
                &[("app", "mongo"), ("statefulset.kubernetes.io/pod-name", "mongo-1")],
                Some(("StatefulSet", "mongo")),
            ),
        ]);

        assert_eq!(workloads.len(), 1);
        assert_eq!(
            workloads[0].labels,
            BTreeMap::from([("app".to_string(), "mongo".to_string())])
        );
    }
}
