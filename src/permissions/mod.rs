//! Permission aggregator
//!
//! Asks the cluster, per config kind and verb, whether the caller may act on
//! the kind in a namespace. One task per kind; a kind whose checks fail
//! degrades to an empty verb set with a diagnostic.

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ApiError, EngineError, EngineResult};
use crate::kube::ClusterApi;
use crate::models::{ConfigKind, Diagnostic, KindPermissions, PermissionMap, Verb};

/// Verb sets for one namespace plus the kinds that could not be checked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespacePermissions {
    pub permissions: KindPermissions,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct PermissionAggregator {
    api: Arc<dyn ClusterApi>,
    verbs: Vec<Verb>,
    timeout: Duration,
}

impl PermissionAggregator {
    pub fn new(api: Arc<dyn ClusterApi>, timeout: Duration) -> Self {
        Self {
            api,
            verbs: Verb::ALL.to_vec(),
            timeout,
        }
    }

    /// Restrict the verbs that are checked
    pub fn with_verbs(mut self, verbs: impl IntoIterator<Item = Verb>) -> Self {
        self.verbs = verbs.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Allowed verbs per resource name in `namespace`; every kind has an entry
    pub async fn compute(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<NamespacePermissions> {
        let deadline = Instant::now() + self.timeout;
        self.compute_until(namespace, cancel, deadline).await
    }

    /// `compute` for several namespaces under one deadline
    pub async fn compute_many(
        &self,
        namespaces: &[String],
        cancel: &CancellationToken,
    ) -> EngineResult<(PermissionMap, Vec<Diagnostic>)> {
        let deadline = Instant::now() + self.timeout;
        let results = join_all(
            namespaces
                .iter()
                .map(|ns| self.compute_until(ns, cancel, deadline)),
        )
        .await;

        let mut map = PermissionMap::new();
        let mut diagnostics = Vec::new();
        for (ns, result) in namespaces.iter().zip(results) {
            let outcome = result?;
            map.insert(ns.clone(), outcome.permissions);
            diagnostics.extend(outcome.diagnostics);
        }
        Ok((map, diagnostics))
    }

    async fn compute_until(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> EngineResult<NamespacePermissions> {
        let kinds = ConfigKind::all();
        let tasks: Vec<JoinHandle<Result<BTreeSet<Verb>, String>>> = kinds
            .iter()
            .map(|&kind| {
                tokio::spawn(check_kind(
                    Arc::clone(&self.api),
                    namespace.to_string(),
                    kind,
                    self.verbs.clone(),
                    deadline,
                ))
            })
            .collect();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                for handle in &aborts {
                    handle.abort();
                }
                return Err(EngineError::Cancelled);
            }
            joined = join_all(tasks) => joined,
        };

        let mut outcome = NamespacePermissions::default();
        for (kind, joined) in kinds.iter().zip(joined) {
            let verbs = match joined {
                Ok(Ok(verbs)) => verbs,
                Ok(Err(message)) => {
                    warn!(namespace, kind = %kind, %message, "Permission check degraded");
                    outcome
                        .diagnostics
                        .push(Diagnostic::for_kind(*kind, Some(namespace), message));
                    BTreeSet::new()
                }
                Err(e) => {
                    warn!(namespace, kind = %kind, error = %e, "Permission task failed");
                    outcome.diagnostics.push(Diagnostic::for_kind(
                        *kind,
                        Some(namespace),
                        format!("permission task failed: {}", e),
                    ));
                    BTreeSet::new()
                }
            };
            outcome
                .permissions
                .insert(kind.resource_name().to_string(), verbs);
        }

        debug!(
            namespace,
            kinds = outcome.permissions.len(),
            degraded = outcome.diagnostics.len(),
            "Computed permissions"
        );
        Ok(outcome)
    }
}

/// Check every verb for one kind; `Forbidden` means the verb is not granted
async fn check_kind(
    api: Arc<dyn ClusterApi>,
    namespace: String,
    kind: ConfigKind,
    verbs: Vec<Verb>,
    deadline: Instant,
) -> Result<BTreeSet<Verb>, String> {
    let checks = join_all(verbs.iter().map(|&verb| {
        let api = &api;
        let namespace = &namespace;
        async move { (verb, api.can_i(namespace, kind, verb).await) }
    }));

    let results = timeout_at(deadline, checks)
        .await
        .map_err(|_| "deadline exceeded".to_string())?;

    let mut allowed = BTreeSet::new();
    for (verb, result) in results {
        match result {
            Ok(true) => {
                allowed.insert(verb);
            }
            Ok(false) | Err(ApiError::Forbidden(_)) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(allowed)
}
