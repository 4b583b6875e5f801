//! Reference resolution between collected config objects
//!
//! `hosts` parses hostnames, `resolve` decides whether a target is present,
//! missing or unknown, `extract` reads the outgoing references of each kind
//! and `graph` assembles them into an indexed graph.

pub mod extract;
pub mod graph;
pub mod hosts;
pub mod resolve;

pub use graph::{Edge, Node, NodeId, ReferenceGraph, ReferenceSummary, Relation};
pub use hosts::{DEFAULT_CLUSTER_DOMAIN_SUFFIX, ParsedHost};
pub use resolve::{Resolution, Resolver, TargetStatus};
