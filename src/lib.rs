//! meshcfg library
//!
//! Aggregates Istio and Gateway-API configuration objects per namespace,
//! resolves the references between them and the mesh registry, validates
//! them with a fixed rule set and reports per-kind access permissions.
//!
//! [`services::ConfigService`] is the entry point; the cluster is reached
//! through the [`kube::ClusterApi`] trait so tests and embedders can supply
//! their own backend.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod kube;
pub mod models;
pub mod permissions;
pub mod references;
pub mod services;
pub mod validation;

pub use collector::ListOptions;
pub use error::{ApiError, EngineError, EngineResult};
pub use services::{ConfigDetails, ConfigService, EngineOptions};
