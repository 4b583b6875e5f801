//! Mesh configuration model layer
//!
//! Structure:
//! - `config_kind.rs` - The closed set of supported kinds and their API coordinates
//! - `istio.rs` / `gateway_api.rs` - Typed resource payloads
//! - `object.rs` - Sum type over all payloads
//! - `config_list.rs` - Per-namespace listing
//! - `registry.rs`, `reference.rs`, `validation.rs`, `permissions.rs` - Engine outputs and inputs

pub mod config_kind;
pub mod config_list;
pub mod gateway_api;
pub mod istio;
pub mod object;
pub mod permissions;
pub mod reference;
pub mod registry;
pub mod validation;

pub use config_kind::ConfigKind;
pub use config_list::{ConfigList, Diagnostic, NamespaceRef};
pub use gateway_api::Gateway as K8sGatewayResource;
pub use istio::Gateway as IstioGateway;
pub use object::{ConfigObject, ConfigRef, ObjectKey};
pub use permissions::{KindPermissions, PermissionMap, Verb};
pub use reference::{RefKey, RefKind};
pub use registry::{MeshRegistry, ServiceInfo, Workload};
pub use validation::{Check, Severity, ValidationEntry, ValidationReport};
