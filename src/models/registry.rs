//! Mesh registry: the non-config entities references can point at
//!
//! Each part is `None` when it could not be fetched, which turns lookups
//! against it into "unknown" answers instead of failures.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ServiceInfo {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    /// Controller kind, e.g. `Deployment`
    pub kind: String,
    pub labels: BTreeMap<String, String>,
}

impl Workload {
    /// A selector matches when every selector label is carried by the workload
    pub fn matches(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).is_some_and(|l| l == v))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRegistry {
    pub namespaces: Option<BTreeSet<String>>,
    pub services: Option<Vec<ServiceInfo>>,
    pub workloads: Option<Vec<Workload>>,
}

impl MeshRegistry {
    pub fn namespace_exists(&self, namespace: &str) -> Option<bool> {
        self.namespaces.as_ref().map(|ns| ns.contains(namespace))
    }

    pub fn service_exists(&self, namespace: &str, name: &str) -> Option<bool> {
        self.services
            .as_ref()
            .map(|svcs| svcs.iter().any(|s| s.namespace == namespace && s.name == name))
    }

    /// Workloads matching `selector`, restricted to `namespace` when given
    pub fn matching_workloads(
        &self,
        namespace: Option<&str>,
        selector: &BTreeMap<String, String>,
    ) -> Option<Vec<&Workload>> {
        self.workloads.as_ref().map(|workloads| {
            workloads
                .iter()
                .filter(|w| namespace.is_none_or(|ns| w.namespace == ns))
                .filter(|w| w.matches(selector))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_parts_answer_none() {
        let registry = MeshRegistry::default();
        assert_eq!(registry.namespace_exists("bookinfo"), None);
        assert_eq!(registry.service_exists("bookinfo", "reviews"), None);
        assert!(registry.matching_workloads(None, &labels(&[])).is_none());
    }

    #[test]
    fn test_selector_matching() {
        let registry = MeshRegistry {
            workloads: Some(vec![
                Workload {
                    namespace: "bookinfo".into(),
                    name: "reviews-v1".into(),
                    kind: "Deployment".into(),
                    labels: labels(&[("app", "reviews"), ("version", "v1")]),
                },
                Workload {
                    namespace: "other".into(),
                    name: "reviews-v1".into(),
                    kind: "Deployment".into(),
                    labels: labels(&[("app", "reviews"), ("version", "v1")]),
                },
            ]),
            ..Default::default()
        };

        let selector = labels(&[("app", "reviews")]);
        assert_eq!(
            registry
                .matching_workloads(Some("bookinfo"), &selector)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(registry.matching_workloads(None, &selector).unwrap().len(), 2);
        assert!(
            registry
                .matching_workloads(None, &labels(&[("app", "ratings")]))
                .unwrap()
                .is_empty()
        );
    }
}
