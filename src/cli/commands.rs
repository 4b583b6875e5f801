//! CLI command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::collector::ListOptions;
use crate::config::{self, ConfigLoader, paths};
use crate::error::{EngineError, EngineResult};
use crate::kube::{self, KubeClusterApi};
use crate::models::ConfigKind;
use crate::services::ConfigService;

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "defaultNamespace", "engine.disabledRules")
        key: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "defaultNamespace", "engine.disabledRules")
        key: String,
        /// Configuration value
        value: String,
    },
    /// List all configuration
    List,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

/// Arguments of the `list` command
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub kinds: Vec<String>,
    pub selector: Option<String>,
    pub validate: bool,
}

impl ListRequest {
    fn options(&self) -> EngineResult<ListOptions> {
        let kinds = self
            .kinds
            .iter()
            .map(|kind| {
                kind.parse::<ConfigKind>()
                    .map_err(|_| EngineError::UnknownKind(kind.clone()))
            })
            .collect::<EngineResult<BTreeSet<_>>>()?;
        Ok(ListOptions {
            kinds,
            label_selector: self.selector.clone(),
            include_validations: self.validate,
        })
    }
}

/// Build the config service against the selected kubeconfig context
async fn connect(context: Option<&str>) -> Result<(ConfigService, config::Config)> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let client = kube::create_client(context).await?;
    tracing::debug!(
        context = context.map(str::to_string).or_else(kube::current_context),
        "Connected to cluster"
    );
    let api = Arc::new(KubeClusterApi::new(client));
    Ok((ConfigService::new(api, config.engine_options()), config))
}

/// Cancel the request when Ctrl-C is pressed
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling request");
            token.cancel();
        }
    });
    cancel
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

pub async fn handle_list(context: Option<&str>, request: ListRequest) -> Result<()> {
    let options = request.options()?;
    let (service, config) = connect(context).await?;
    let cancel = cancel_on_interrupt();

    if request.all_namespaces {
        let lists = service.list_all_configs(&options, &cancel).await?;
        for list in lists.values() {
            log_diagnostics(list);
        }
        print_json(&lists)
    } else {
        let namespace = request.namespace.unwrap_or(config.default_namespace);
        let list = service.list_configs(&namespace, &options, &cancel).await?;
        log_diagnostics(&list);
        print_json(&list)
    }
}

fn log_diagnostics(list: &crate::models::ConfigList) {
    for diagnostic in &list.diagnostics {
        tracing::warn!(namespace = list.namespace(), %diagnostic, "Partial listing");
    }
}

pub async fn handle_get(context: Option<&str>, namespace: &str, kind: &str, name: &str) -> Result<()> {
    let (service, _) = connect(context).await?;
    let cancel = cancel_on_interrupt();
    let details = service
        .get_config_details(namespace, kind, name, &cancel)
        .await?;
    print_json(&details)
}

pub async fn handle_permissions(context: Option<&str>, namespaces: &[String]) -> Result<()> {
    let (service, _) = connect(context).await?;
    let cancel = cancel_on_interrupt();
    let permissions = service.get_permissions_for(namespaces, &cancel).await?;
    print_json(&permissions)
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key } => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;

            if let Some(key) = key {
                let value = config::get_config_value(&config, &key)?;
                println!("{}", value);
            } else {
                let yaml =
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
                print!("{}", yaml);
            }
        }
        ConfigSubcommand::Set { key, value } => {
            // Start from the file alone so environment overrides are not persisted
            let path = paths::root_config_path();
            let mut config = if path.exists() {
                ConfigLoader::load_file(&path)?
            } else {
                ConfigLoader::load_defaults()
            };

            config::set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;
            ConfigLoader::check(&config)?;

            ConfigLoader::save_root(&config).context("Failed to save configuration")?;
            println!("Configuration saved");
        }
        ConfigSubcommand::List => {
            let config = ConfigLoader::load().context("Failed to load configuration")?;
            let yaml =
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigSubcommand::Path => {
            println!("{}", paths::root_config_path().display());
        }
        ConfigSubcommand::Validate => {
            ConfigLoader::validate().context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
