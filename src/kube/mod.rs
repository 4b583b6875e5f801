//! Kubernetes client module
//!
//! Handles connection to the Kubernetes API server and exposes the
//! [`ClusterApi`] seam the engine reads cluster state through.
//!
//! HTTP/HTTPS proxies are honoured through the standard `HTTP_PROXY`,
//! `HTTPS_PROXY` and `NO_PROXY` environment variables.

pub mod client;

pub use client::{ClusterApi, KubeClusterApi, ListQuery, Scope};

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

/// Initialize and return a Kubernetes client
///
/// Without an explicit context the default loading strategy applies:
/// 1. In-cluster config (if running in a pod)
/// 2. KUBECONFIG environment variable
/// 3. ~/.kube/config
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context '{}'", context))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    tracing::debug!(cluster_url = %config.cluster_url, "Creating Kubernetes client");
    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Current kubeconfig context name, if a kubeconfig is available
pub fn current_context() -> Option<String> {
    Kubeconfig::read().ok().and_then(|kc| kc.current_context)
}
