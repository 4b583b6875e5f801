//! Config service
//!
//! Façade over the collector, reference graph, validation engine and
//! permission aggregator. Each call is one request: it owns its collected
//! state and discards it after building the response.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::{CollectedState, Collector, DEFAULT_REQUEST_TIMEOUT, ListOptions, guarded};
use crate::error::{ApiError, EngineError, EngineResult};
use crate::kube::ClusterApi;
use crate::models::{
    ConfigKind, ConfigList, ConfigObject, NamespaceRef, ObjectKey, PermissionMap, RefKey,
    ValidationEntry, Verb,
};
use crate::permissions::PermissionAggregator;
use crate::references::{DEFAULT_CLUSTER_DOMAIN_SUFFIX, ReferenceGraph, ReferenceSummary};
use crate::validation::{RuleSet, ValidationEngine};

/// Tunables of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub request_timeout: Duration,
    pub cluster_domain_suffix: String,
    /// Rule codes to skip
    pub disabled_rules: Vec<String>,
    /// Verbs checked by the permission aggregator
    pub verbs: Vec<Verb>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cluster_domain_suffix: DEFAULT_CLUSTER_DOMAIN_SUFFIX.to_string(),
            disabled_rules: Vec::new(),
            verbs: Verb::ALL.to_vec(),
        }
    }
}

/// One object with its references, verdict and the caller's verbs on its kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDetails {
    pub namespace: NamespaceRef,
    pub object_type: ConfigKind,
    pub resource: ConfigObject,
    pub references: ReferenceSummary,
    pub validation: ValidationEntry,
    pub permissions: BTreeSet<Verb>,
}

pub struct ConfigService {
    collector: Collector,
    permissions: PermissionAggregator,
    engine: ValidationEngine,
    api: Arc<dyn ClusterApi>,
}

impl ConfigService {
    pub fn new(api: Arc<dyn ClusterApi>, options: EngineOptions) -> Self {
        let rules = RuleSet::default_rules().without(&options.disabled_rules);
        Self {
            collector: Collector::new(Arc::clone(&api), options.request_timeout),
            permissions: PermissionAggregator::new(Arc::clone(&api), options.request_timeout)
                .with_verbs(options.verbs),
            engine: ValidationEngine::new(rules, options.cluster_domain_suffix),
            api,
        }
    }

    pub fn engine(&self) -> &ValidationEngine {
        &self.engine
    }

    /// Config objects of one namespace with their validations
    pub async fn list_configs(
        &self,
        namespace: &str,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<ConfigList> {
        let state = self.collector.fetch_namespace(namespace, options, cancel).await?;
        let mut lists = self.finish_listing(state, options, cancel)?;
        Ok(lists
            .remove(namespace)
            .unwrap_or_else(|| ConfigList::new(namespace)))
    }

    /// Config objects of every namespace, keyed by namespace
    pub async fn list_all_configs(
        &self,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<BTreeMap<String, ConfigList>> {
        let state = self.collector.fetch_all(options, cancel).await?;
        self.finish_listing(state, options, cancel)
    }

    fn finish_listing(
        &self,
        state: CollectedState,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<BTreeMap<String, ConfigList>> {
        if !options.include_validations {
            return Ok(state.into_lists());
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let graph = ReferenceGraph::build(&state, self.engine.cluster_domain_suffix());
        let report = self.engine.validate(&state, &graph, None)?;
        let invalid = report.invalid().count();

        let mut lists = state.into_lists();
        for (ns, validations) in report.split_by_namespace() {
            if let Some(list) = lists.get_mut(&ns) {
                list.validations = validations;
            }
        }
        info!(namespaces = lists.len(), invalid, "Validated listing");
        Ok(lists)
    }

    /// One object with references, validation and permissions
    pub async fn get_config_details(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<ConfigDetails> {
        let kind: ConfigKind = kind
            .parse()
            .map_err(|_| EngineError::UnknownKind(kind.to_string()))?;
        let key = ObjectKey::new(kind, namespace, name);

        let list_options = ListOptions::default();
        let deadline = Instant::now() + self.collector.timeout();
        let (mut state, permissions) = tokio::try_join!(
            self.collector
                .fetch_namespace_until(namespace, &list_options, deadline, cancel),
            self.permissions.compute(namespace, cancel),
        )?;

        if state.find(&key).is_none() {
            self.fetch_single(&mut state, &key, deadline, cancel).await?;
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let graph = ReferenceGraph::build(&state, self.engine.cluster_domain_suffix());
        let validation = self
            .engine
            .validate(&state, &graph, Some(&key))?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(&key))?;
        let resource = state
            .find(&key)
            .map(|obj| obj.to_owned_object())
            .ok_or_else(|| not_found(&key))?;

        debug!(object = %key, valid = validation.valid, "Built config details");
        Ok(ConfigDetails {
            namespace: NamespaceRef {
                name: namespace.to_string(),
            },
            object_type: kind,
            references: graph.summary(&RefKey::from(&key)),
            validation,
            permissions: permissions
                .permissions
                .get(kind.resource_name())
                .cloned()
                .unwrap_or_default(),
            resource,
        })
    }

    /// Fall back to a direct read when the kind could not be listed
    async fn fetch_single(
        &self,
        state: &mut CollectedState,
        key: &ObjectKey,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        if state.kind_fetched(&key.namespace, key.kind) {
            return Err(not_found(key));
        }

        let call = self.api.get(key.kind, &key.namespace, &key.name);
        let value = match guarded(cancel, deadline, call).await {
            Ok(value) => value,
            Err(EngineError::Upstream(ApiError::NotFound(_))) => return Err(not_found(key)),
            Err(e) => return Err(e),
        };

        let object = ConfigObject::decode(key.kind, value).map_err(|e| {
            warn!(object = %key, error = %e, "Undecodable object");
            EngineError::Upstream(ApiError::Unavailable(format!("undecodable payload: {}", e)))
        })?;
        if let Some(list) = state.list_mut(&key.namespace) {
            list.push(object).map_err(|_| not_found(key))?;
        }
        Ok(())
    }

    /// Verbs per resource name in one namespace
    pub async fn get_permissions(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<PermissionMap> {
        self.get_permissions_for(&[namespace.to_string()], cancel).await
    }

    /// Verbs per resource name for each namespace
    pub async fn get_permissions_for(
        &self,
        namespaces: &[String],
        cancel: &CancellationToken,
    ) -> EngineResult<PermissionMap> {
        let (map, diagnostics) = self.permissions.compute_many(namespaces, cancel).await?;
        for diagnostic in &diagnostics {
            warn!(%diagnostic, "Permission check degraded");
        }
        Ok(map)
    }
}

fn not_found(key: &ObjectKey) -> EngineError {
    EngineError::ObjectNotFound {
        kind: key.kind,
        namespace: key.namespace.clone(),
        name: key.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::client::MockClusterApi;
    use serde_json::json;

    fn service(mock: MockClusterApi) -> ConfigService {
        ConfigService::new(Arc::new(mock), EngineOptions::default())
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected_before_any_call() {
        let mock = MockClusterApi::new();
        let err = service(mock)
            .get_config_details("bookinfo", "widgets", "a", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownKind("widgets".into()));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_details_fall_back_to_get_when_kind_failed() {
        let mut mock = MockClusterApi::new();
        mock.expect_namespace_exists().returning(|_| Ok(true));
        mock.expect_list_namespaces()
            .returning(|| Ok(vec!["bookinfo".to_string()]));
        mock.expect_list_services().returning(|_| Ok(Vec::new()));
        mock.expect_list_workloads().returning(|_| Ok(Vec::new()));
        mock.expect_can_i().returning(|_, _, _| Ok(true));
        mock.expect_list().returning(|query| match query.kind {
            ConfigKind::Sidecar => Err(ApiError::Unavailable("flaky".into())),
            _ => Ok(Vec::new()),
        });
        mock.expect_get().returning(|_, _, name| {
            Ok(json!({
                "apiVersion": "networking.istio.io/v1",
                "kind": "Sidecar",
                "metadata": {"name": name, "namespace": "bookinfo"},
                "spec": {"egress": [{"hosts": ["./*"]}]}
            }))
        });

        let details = service(mock)
            .get_config_details("bookinfo", "sidecars", "default", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(details.object_type, ConfigKind::Sidecar);
        assert_eq!(details.validation.name, "default");
        assert!(details.validation.valid);
        assert_eq!(details.permissions.len(), 6);
    }

    #[tokio::test]
    async fn test_details_missing_object() {
        let mut mock = MockClusterApi::new();
        mock.expect_namespace_exists().returning(|_| Ok(true));
        mock.expect_list_namespaces()
            .returning(|| Ok(vec!["bookinfo".to_string()]));
        mock.expect_list_services().returning(|_| Ok(Vec::new()));
        mock.expect_list_workloads().returning(|_| Ok(Vec::new()));
        mock.expect_can_i().returning(|_, _, _| Ok(true));
        mock.expect_list().returning(|_| Ok(Vec::new()));

        let err = service(mock)
            .get_config_details("bookinfo", "virtualservices", "invalid", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ObjectNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }
}
