//! Reference graph between config objects and registry entities
//!
//! Nodes live in an arena indexed by `NodeId`; edges keep forward and
//! reverse adjacency lists so both "what does X point at" and "who points
//! at X" are cheap.

use serde::Serialize;
use std::collections::HashMap;

use super::extract::links;
use super::resolve::{Resolver, TargetStatus};
use crate::collector::CollectedState;
use crate::models::{RefKey, RefKind};

pub type NodeId = usize;

/// Label on an edge describing how the source refers to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    /// VirtualService → Gateway
    Gateway,
    /// VirtualService → service, service entry or host
    DestinationHost,
    /// VirtualService → DestinationRule for the same host
    DestinationRule,
    /// DestinationRule → service, service entry or host
    Host,
    /// DestinationRule → workload carrying a subset's labels
    SubsetWorkload,
    /// Selector → selected workload or workload entry
    Selects,
    /// Route → K8sGateway
    ParentGateway,
    /// Route → backend service
    Backend,
    /// Route → ReferenceGrant permitting a cross-namespace backend
    GrantedBy,
    /// ReferenceGrant → namespace
    FromNamespace,
    /// AuthorizationPolicy → namespace
    SourceNamespace,
    /// AuthorizationPolicy → host
    OperationHost,
    /// Sidecar → egress host
    EgressHost,
    /// WorkloadEntry → ServiceEntry selecting it
    SelectedBy,
}

/// A node in the reference graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Identity of the object or entity
    pub key: RefKey,
    /// Whether the target was found in the collected state
    pub status: TargetStatus,
}

/// A directed edge between two nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Referencing node
    pub from: NodeId,
    /// Referenced node
    pub to: NodeId,
    /// Relationship type
    pub relation: Relation,
    /// Field of the referencing object holding the reference
    pub path: String,
}

/// Grouped view of one object's references
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSummary {
    pub object_references: Vec<RefKey>,
    pub service_references: Vec<RefKey>,
    pub workload_references: Vec<RefKey>,
    pub referenced_by: Vec<RefKey>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<RefKey, NodeId>,
    /// Edge ids leaving each node, in insertion order
    forward: Vec<Vec<usize>>,
    /// Edge ids entering each node, in insertion order
    reverse: Vec<Vec<usize>>,
}

impl ReferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every collected object, in fetch order
    pub fn build(state: &CollectedState, suffix: &str) -> Self {
        let resolver = Resolver::new(state, suffix);
        let objects = state.objects();
        let mut graph = Self::new();

        for obj in &objects {
            graph.add_node(obj.key().into(), TargetStatus::Present);
        }
        for obj in objects {
            let from = graph.add_node(obj.key().into(), TargetStatus::Present);
            for link in links(&resolver, obj) {
                let to = graph.add_node(link.target.target, link.target.status);
                graph.add_edge(from, to, link.relation, link.path);
            }
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Built reference graph"
        );
        graph
    }

    /// Insert a node or return the existing one; `Present` wins over other statuses
    pub fn add_node(&mut self, key: RefKey, status: TargetStatus) -> NodeId {
        if let Some(&id) = self.index.get(&key) {
            if status == TargetStatus::Present {
                self.nodes[id].status = TargetStatus::Present;
            }
            return id;
        }
        let id = self.nodes.len();
        self.index.insert(key.clone(), id);
        self.nodes.push(Node { key, status });
        self.forward.push(Vec::new());
        self.reverse.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, relation: Relation, path: String) {
        let duplicate = self.forward[from].iter().any(|&e| {
            let edge = &self.edges[e];
            edge.to == to && edge.relation == relation
        });
        if duplicate {
            return;
        }
        let id = self.edges.len();
        self.edges.push(Edge {
            from,
            to,
            relation,
            path,
        });
        self.forward[from].push(id);
        self.reverse[to].push(id);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, key: &RefKey) -> Option<&Node> {
        self.index.get(key).map(|&id| &self.nodes[id])
    }

    pub fn node_at(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Edges leaving `key` with their target nodes
    pub fn outgoing(&self, key: &RefKey) -> Vec<(&Edge, &Node)> {
        let Some(&id) = self.index.get(key) else {
            return Vec::new();
        };
        self.forward[id]
            .iter()
            .map(|&e| (&self.edges[e], &self.nodes[self.edges[e].to]))
            .collect()
    }

    /// Edges entering `key` with their source nodes
    pub fn incoming(&self, key: &RefKey) -> Vec<(&Edge, &Node)> {
        let Some(&id) = self.index.get(key) else {
            return Vec::new();
        };
        self.reverse[id]
            .iter()
            .map(|&e| (&self.edges[e], &self.nodes[self.edges[e].from]))
            .collect()
    }

    /// Edges whose target is known to be absent
    pub fn dangling(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|edge| self.nodes[edge.to].status == TargetStatus::Missing)
    }

    pub fn summary(&self, key: &RefKey) -> ReferenceSummary {
        let mut summary = ReferenceSummary::default();
        for (_, node) in self.outgoing(key) {
            let bucket = match node.key.kind {
                RefKind::Service | RefKind::Host => &mut summary.service_references,
                RefKind::Workload => &mut summary.workload_references,
                RefKind::Config(_) | RefKind::Namespace => &mut summary.object_references,
            };
            if !bucket.contains(&node.key) {
                bucket.push(node.key.clone());
            }
        }
        for (_, node) in self.incoming(key) {
            if !summary.referenced_by.contains(&node.key) {
                summary.referenced_by.push(node.key.clone());
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::Scope;
    use crate::models::{ConfigKind, ConfigObject, ServiceInfo, Workload};
    use crate::references::hosts::DEFAULT_CLUSTER_DOMAIN_SUFFIX;
    use serde_json::{Value, json};

    fn push(state: &mut CollectedState, kind: ConfigKind, value: Value) {
        let obj = ConfigObject::decode(kind, value).unwrap();
        let ns = obj.namespace().to_string();
        state.list_mut(&ns).unwrap().push(obj).unwrap();
    }

    fn bookinfo() -> CollectedState {
        let mut state = CollectedState::new(Scope::Namespace("bookinfo".into()), ["bookinfo"]);
        for kind in ConfigKind::all() {
            state.mark_fetched("bookinfo", *kind);
        }
        state.registry.services = Some(vec![ServiceInfo {
            namespace: "bookinfo".into(),
            name: "reviews".into(),
        }]);
        state.registry.workloads = Some(vec![Workload {
            namespace: "bookinfo".into(),
            name: "reviews-v1".into(),
            kind: "Deployment".into(),
            labels: [("app", "reviews"), ("version", "v1")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }]);

        push(
            &mut state,
            ConfigKind::DestinationRule,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "DestinationRule",
                "metadata": {"name": "reviews", "namespace": "bookinfo"},
                "spec": {
                    "host": "reviews",
                    "subsets": [{"name": "v1", "labels": {"version": "v1"}}]
                }
            }),
        );
        push(
            &mut state,
            ConfigKind::VirtualService,
            json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "VirtualService",
                "metadata": {"name": "reviews", "namespace": "bookinfo"},
                "spec": {
                    "hosts": ["reviews"],
                    "gateways": ["bookinfo-gateway", "mesh"],
                    "http": [{"route": [
                        {"destination": {"host": "reviews", "subset": "v1"}},
                        {"destination": {"host": "ratings"}}
                    ]}]
                }
            }),
        );
        state
    }

    #[test]
    fn test_virtual_service_edges() {
        let state = bookinfo();
        let graph = ReferenceGraph::build(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        let vs = RefKey::config(ConfigKind::VirtualService, "bookinfo", "reviews");

        let out: Vec<_> = graph
            .outgoing(&vs)
            .into_iter()
            .map(|(edge, node)| (edge.relation, node.key.to_string(), node.status))
            .collect();
        assert_eq!(
            out,
            vec![
                (
                    Relation::Gateway,
                    "gateway/bookinfo/bookinfo-gateway".to_string(),
                    TargetStatus::Missing
                ),
                (
                    Relation::DestinationHost,
                    "service/bookinfo/reviews".to_string(),
                    TargetStatus::Present
                ),
                (
                    Relation::DestinationRule,
                    "destinationrule/bookinfo/reviews".to_string(),
                    TargetStatus::Present
                ),
                (
                    Relation::DestinationHost,
                    "service/bookinfo/ratings".to_string(),
                    TargetStatus::Missing
                ),
            ]
        );
    }

    #[test]
    fn test_reverse_index_and_summary() {
        let state = bookinfo();
        let graph = ReferenceGraph::build(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        let dr = RefKey::config(ConfigKind::DestinationRule, "bookinfo", "reviews");

        let summary = graph.summary(&dr);
        assert_eq!(summary.service_references, vec![RefKey::service("bookinfo", "reviews")]);
        assert_eq!(
            summary.workload_references,
            vec![RefKey::workload("bookinfo", "reviews-v1")]
        );
        assert_eq!(
            summary.referenced_by,
            vec![RefKey::config(ConfigKind::VirtualService, "bookinfo", "reviews")]
        );
    }

    #[test]
    fn test_dangling_edges_keep_paths() {
        let state = bookinfo();
        let graph = ReferenceGraph::build(&state, DEFAULT_CLUSTER_DOMAIN_SUFFIX);
        let paths: Vec<&str> = graph.dangling().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["spec/gateways[0]", "spec/http[0]/route[1]/destination/host"]
        );
    }

    #[test]
    fn test_present_status_wins() {
        let mut graph = ReferenceGraph::new();
        let key = RefKey::service("a", "b");
        let id = graph.add_node(key.clone(), TargetStatus::Unknown);
        assert_eq!(graph.add_node(key.clone(), TargetStatus::Present), id);
        assert_eq!(graph.node(&key).unwrap().status, TargetStatus::Present);
        graph.add_node(key.clone(), TargetStatus::Missing);
        assert_eq!(graph.node(&key).unwrap().status, TargetStatus::Present);
    }
}
