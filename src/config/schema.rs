//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::Verb;
use crate::references::DEFAULT_CLUSTER_DOMAIN_SUFFIX;
use crate::services::EngineOptions;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Namespace used by `list` when neither `-n` nor `-A` is given
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Permission checks
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Bound for one request's fan-out, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// DNS suffix appended to `name.namespace` when canonicalizing hosts
    #[serde(default = "default_cluster_domain_suffix")]
    pub cluster_domain_suffix: String,

    /// Validation rule codes to skip (e.g. "KIA1107")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_rules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionsConfig {
    #[serde(default = "default_verbs")]
    pub verbs: Vec<Verb>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            engine: EngineConfig::default(),
            permissions: PermissionsConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            cluster_domain_suffix: default_cluster_domain_suffix(),
            disabled_rules: Vec::new(),
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            verbs: default_verbs(),
        }
    }
}

impl Config {
    /// Engine tunables derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            request_timeout: Duration::from_secs(self.engine.request_timeout_seconds),
            cluster_domain_suffix: self.engine.cluster_domain_suffix.clone(),
            disabled_rules: self.engine.disabled_rules.clone(),
            verbs: self.permissions.verbs.clone(),
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_cluster_domain_suffix() -> String {
    DEFAULT_CLUSTER_DOMAIN_SUFFIX.to_string()
}

fn default_verbs() -> Vec<Verb> {
    Verb::ALL.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            "engine:\n  disabledRules: [KIA1107]\npermissions:\n  verbs: [get, list]\n",
        )
        .unwrap();
        assert_eq!(config.default_namespace, "default");
        assert_eq!(config.engine.request_timeout_seconds, 10);
        assert_eq!(config.engine.disabled_rules, vec!["KIA1107"]);
        assert_eq!(config.permissions.verbs, vec![Verb::Get, Verb::List]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("readOnly: true\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_options() {
        let mut config = Config::default();
        config.engine.request_timeout_seconds = 3;
        let options = config.engine_options();
        assert_eq!(options.request_timeout, Duration::from_secs(3));
        assert_eq!(options.cluster_domain_suffix, "svc.cluster.local");
        assert_eq!(options.verbs.len(), 6);
    }
}
