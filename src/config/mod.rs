//! Configuration system for meshcfg
//!
//! Built-in defaults, a root YAML file and environment overrides, plus
//! dot-notation accessors used by the `config` subcommands.

mod defaults;
pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{Config, EngineConfig, PermissionsConfig};

use anyhow::Context;

use crate::models::Verb;

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "defaultNamespace" => Ok(config.default_namespace.clone()),
        "engine.requestTimeoutSeconds" => Ok(config.engine.request_timeout_seconds.to_string()),
        "engine.clusterDomainSuffix" => Ok(config.engine.cluster_domain_suffix.clone()),
        "engine.disabledRules" => Ok(config.engine.disabled_rules.join(",")),
        "permissions.verbs" => Ok(config
            .permissions
            .verbs
            .iter()
            .map(Verb::as_str)
            .collect::<Vec<_>>()
            .join(",")),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
///
/// List values accept a YAML array or a comma-separated list.
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    match key {
        "defaultNamespace" => {
            config.default_namespace = value.to_string();
        }
        "engine.requestTimeoutSeconds" => {
            config.engine.request_timeout_seconds = value
                .parse()
                .context("engine.requestTimeoutSeconds must be a number")?;
        }
        "engine.clusterDomainSuffix" => {
            config.engine.cluster_domain_suffix = value.trim_matches('.').to_string();
        }
        "engine.disabledRules" => {
            config.engine.disabled_rules = parse_list(value)
                .context("engine.disabledRules must be a list of rule codes")?
                .into_iter()
                .map(|code| code.to_uppercase())
                .collect();
        }
        "permissions.verbs" => {
            config.permissions.verbs = parse_list(value)?
                .iter()
                .map(|verb| verb.parse::<Verb>().map_err(anyhow::Error::msg))
                .collect::<anyhow::Result<Vec<Verb>>>()
                .context("permissions.verbs must list get, list, create, update, patch or delete")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    Ok(())
}

fn parse_list(value: &str) -> anyhow::Result<Vec<String>> {
    if value.trim_start().starts_with('[') {
        return serde_yaml::from_str(value).context("Invalid YAML array");
    }
    Ok(value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
