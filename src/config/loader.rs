//! Configuration loading and layering
//!
//! Precedence order (highest to lowest):
//! 1. Environment variable overrides
//! 2. Root config file
//! 3. Built-in defaults

use super::{defaults, paths, schema::Config};
use crate::models::Verb;
use crate::validation::RuleSet;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers applied
    pub fn load() -> Result<Config> {
        Self::load_from(&paths::root_config_path())
    }

    /// Load configuration layered on the file at `path`
    pub fn load_from(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            Self::load_file(path)?
        } else {
            Self::load_defaults()
        };
        Ok(Self::apply_env_overrides(config))
    }

    /// Load configuration from a file
    pub fn load_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Strict validation of the root config file
    ///
    /// Fails on invalid YAML, unknown keys, invalid value types, a zero
    /// timeout, disabled rule codes that do not exist, and an empty or
    /// repeated verb list.
    pub fn validate() -> Result<()> {
        let path = paths::root_config_path();
        let config = Self::load_from(&path)?;
        Self::check(&config)
    }

    /// Semantic checks on a parsed configuration
    pub fn check(config: &Config) -> Result<()> {
        if config.engine.request_timeout_seconds == 0 {
            anyhow::bail!("engine.requestTimeoutSeconds must be greater than zero");
        }
        if config.engine.cluster_domain_suffix.trim_matches('.').is_empty() {
            anyhow::bail!("engine.clusterDomainSuffix must not be empty");
        }

        let known = RuleSet::default_rules().codes();
        if let Some(unknown) = config
            .engine
            .disabled_rules
            .iter()
            .find(|code| !known.iter().any(|known| *known == code.as_str()))
        {
            anyhow::bail!("engine.disabledRules contains unknown rule code: {}", unknown);
        }

        let verbs = &config.permissions.verbs;
        if verbs.is_empty() {
            anyhow::bail!("permissions.verbs must list at least one verb");
        }
        if verbs.iter().collect::<BTreeSet<&Verb>>().len() != verbs.len() {
            anyhow::bail!("permissions.verbs contains duplicates");
        }
        Ok(())
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        defaults::default_config()
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: Config) -> Config {
        // MESHCFG_DEFAULT_NAMESPACE override
        if let Ok(namespace) = std::env::var("MESHCFG_DEFAULT_NAMESPACE")
            && !namespace.is_empty()
        {
            config.default_namespace = namespace;
        }

        // MESHCFG_REQUEST_TIMEOUT override, in seconds
        if let Ok(timeout) = std::env::var("MESHCFG_REQUEST_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(seconds) => config.engine.request_timeout_seconds = seconds,
                Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid MESHCFG_REQUEST_TIMEOUT"),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Save root configuration
    pub fn save_root(config: &Config) -> Result<()> {
        Self::save(config, &paths::root_config_path())
    }
}
