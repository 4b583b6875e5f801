//! Service layer
//!
//! [`ConfigService`] is the entry point callers use: it composes collection,
//! reference resolution, validation and permission checks into the
//! namespace listing, cluster-wide listing, details and permissions
//! operations.

pub mod config_service;

pub use config_service::{ConfigDetails, ConfigService, EngineOptions};
