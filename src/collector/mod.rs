//! Resource collector
//!
//! Fetches every requested config kind, plus the mesh registry, with one task
//! per fetch. Slots are merged in kind order once all tasks finish, so the
//! result does not depend on completion order.
//!
//! A kind that fails (not installed, forbidden, unavailable, past the
//! deadline, undecodable) leaves its sequence empty and records a
//! [`Diagnostic`]. Only the namespace-existence check can fail a request.

pub mod state;

pub use state::CollectedState;

use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::{Instant, error::Elapsed, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, EngineError, EngineResult};
use crate::kube::{ClusterApi, ListQuery, Scope};
use crate::models::{ConfigKind, ConfigObject, Diagnostic};

/// Default bound for one request's fan-out
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Filters for a listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Kinds to fetch; empty means all kinds
    pub kinds: BTreeSet<ConfigKind>,
    /// Label selector passed through to the API server
    pub label_selector: Option<String>,
    pub include_validations: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            kinds: BTreeSet::new(),
            label_selector: None,
            include_validations: true,
        }
    }
}

impl ListOptions {
    pub fn wants(&self, kind: ConfigKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

type FetchResult<T> = Result<T, String>;

/// Results of one kind task; several entries when it fell back to
/// per-namespace lists
struct KindOutcome {
    results: Vec<(Scope, FetchResult<Vec<Value>>)>,
}

pub struct Collector {
    api: Arc<dyn ClusterApi>,
    timeout: Duration,
}

impl Collector {
    pub fn new(api: Arc<dyn ClusterApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Collect every requested kind in one namespace
    pub async fn fetch_namespace(
        &self,
        namespace: &str,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<CollectedState> {
        let deadline = Instant::now() + self.timeout;
        self.fetch_namespace_until(namespace, options, deadline, cancel).await
    }

    /// Like [`Collector::fetch_namespace`], bounded by a deadline the caller
    /// shares with the rest of its request
    pub async fn fetch_namespace_until(
        &self,
        namespace: &str,
        options: &ListOptions,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> EngineResult<CollectedState> {
        match guarded(cancel, deadline, self.api.namespace_exists(namespace)).await {
            Ok(true) => {}
            Ok(false) | Err(EngineError::Upstream(ApiError::NotFound(_))) => {
                return Err(EngineError::NamespaceNotFound(namespace.to_string()));
            }
            Err(e) => return Err(e),
        }

        let mut state = CollectedState::new(Scope::Namespace(namespace.to_string()), [namespace]);
        self.fan_out(&mut state, options, cancel, deadline).await?;
        Ok(state)
    }

    /// Collect every requested kind across all namespaces
    pub async fn fetch_all(
        &self,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> EngineResult<CollectedState> {
        let deadline = Instant::now() + self.timeout;

        let namespaces = guarded(cancel, deadline, self.api.list_namespaces()).await?;
        let mut state = CollectedState::new(Scope::All, namespaces.iter().cloned());
        state.registry.namespaces = Some(namespaces.into_iter().collect());
        self.fan_out(&mut state, options, cancel, deadline).await?;
        Ok(state)
    }

    async fn fan_out(
        &self,
        state: &mut CollectedState,
        options: &ListOptions,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> EngineResult<()> {
        let scope = state.scope.clone();
        let namespaces: Vec<String> = state.namespaces().map(str::to_string).collect();

        let kinds: Vec<ConfigKind> = ConfigKind::all()
            .iter()
            .copied()
            .filter(|kind| options.wants(*kind))
            .collect();

        let kind_tasks: Vec<JoinHandle<KindOutcome>> = kinds
            .iter()
            .map(|&kind| {
                tokio::spawn(fetch_kind(
                    Arc::clone(&self.api),
                    kind,
                    scope.clone(),
                    namespaces.clone(),
                    options.label_selector.clone(),
                    deadline,
                ))
            })
            .collect();

        let services_task = {
            let api = Arc::clone(&self.api);
            let scope = scope.clone();
            tokio::spawn(async move { timeout_at(deadline, api.list_services(&scope)).await })
        };
        let workloads_task = {
            let api = Arc::clone(&self.api);
            let scope = scope.clone();
            tokio::spawn(async move { timeout_at(deadline, api.list_workloads(&scope)).await })
        };
        // Cluster-wide collection already listed the namespaces
        let namespaces_task = state.registry.namespaces.is_none().then(|| {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move { timeout_at(deadline, api.list_namespaces()).await })
        });

        let mut aborts: Vec<AbortHandle> = kind_tasks.iter().map(JoinHandle::abort_handle).collect();
        aborts.push(services_task.abort_handle());
        aborts.push(workloads_task.abort_handle());
        if let Some(task) = &namespaces_task {
            aborts.push(task.abort_handle());
        }

        let joined = async {
            tokio::join!(join_all(kind_tasks), services_task, workloads_task, async {
                match namespaces_task {
                    Some(task) => Some(task.await),
                    None => None,
                }
            })
        };

        let (kind_results, services, workloads, listed_namespaces) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                for handle in &aborts {
                    handle.abort();
                }
                tracing::debug!(scope = ?scope, "Collection cancelled");
                return Err(EngineError::Cancelled);
            }
            joined = joined => joined,
        };

        for (kind, joined) in kinds.into_iter().zip(kind_results) {
            match joined {
                Ok(outcome) => {
                    for (scope, result) in outcome.results {
                        merge_kind(state, kind, &scope, result);
                    }
                }
                Err(e) => {
                    tracing::warn!(kind = %kind, error = %e, "Fetch task failed");
                    state.record(None, Diagnostic::for_kind(kind, None, format!("fetch task failed: {}", e)));
                }
            }
        }

        state.registry.services = registry_part(state, "services", settle(services));
        state.registry.workloads = registry_part(state, "workloads", settle(workloads));
        if let Some(listed) = listed_namespaces {
            state.registry.namespaces =
                registry_part(state, "namespaces", settle(listed)).map(|ns| ns.into_iter().collect());
        }

        let objects: usize = state.lists.values().map(|l| l.total()).sum();
        let diagnostics: usize = state.lists.values().map(|l| l.diagnostics.len()).sum();
        tracing::info!(
            scope = ?state.scope,
            namespaces = state.lists.len(),
            objects,
            diagnostics,
            "Collected mesh configuration"
        );
        Ok(())
    }
}

/// Run one request-identity call under the request's token and deadline
pub(crate) async fn guarded<T>(
    cancel: &CancellationToken,
    deadline: Instant,
    call: impl Future<Output = Result<T, ApiError>>,
) -> EngineResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        result = timeout_at(deadline, call) => match result {
            Ok(inner) => inner.map_err(EngineError::from),
            Err(_) => Err(EngineError::DeadlineExceeded),
        },
    }
}

async fn fetch_kind(
    api: Arc<dyn ClusterApi>,
    kind: ConfigKind,
    scope: Scope,
    namespaces: Vec<String>,
    label_selector: Option<String>,
    deadline: Instant,
) -> KindOutcome {
    let query = ListQuery::new(kind, scope.clone()).with_selector(label_selector.clone());
    tracing::debug!(kind = %kind, scope = ?scope, "Fetching config kind");

    match timeout_at(deadline, api.list(&query)).await {
        Ok(Err(ApiError::Forbidden(reason))) if scope == Scope::All => {
            tracing::debug!(kind = %kind, %reason, "Cluster-wide list forbidden, listing per namespace");
            let api = &api;
            let results = join_all(namespaces.into_iter().map(|ns| {
                let query = ListQuery::new(kind, Scope::Namespace(ns.clone()))
                    .with_selector(label_selector.clone());
                async move {
                    let result = flatten(timeout_at(deadline, api.list(&query)).await);
                    (Scope::Namespace(ns), result)
                }
            }))
            .await;
            KindOutcome { results }
        }
        result => KindOutcome {
            results: vec![(scope, flatten(result))],
        },
    }
}

fn flatten<T>(result: Result<Result<T, ApiError>, Elapsed>) -> FetchResult<T> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("deadline exceeded".to_string()),
    }
}

fn settle<T>(joined: Result<Result<Result<T, ApiError>, Elapsed>, JoinError>) -> FetchResult<T> {
    match joined {
        Ok(result) => flatten(result),
        Err(e) => Err(format!("fetch task failed: {}", e)),
    }
}

fn registry_part<T>(state: &mut CollectedState, subject: &str, result: FetchResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(message) => {
            tracing::warn!(subject, %message, "Registry fetch degraded");
            state.record(None, Diagnostic::new(subject, None, message));
            None
        }
    }
}

/// Decode a kind's payload all-or-nothing and file objects by namespace
fn merge_kind(state: &mut CollectedState, kind: ConfigKind, scope: &Scope, result: FetchResult<Vec<Value>>) {
    let decoded = result.and_then(|values| {
        values
            .into_iter()
            .map(|value| ConfigObject::decode(kind, value))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("undecodable payload: {}", e))
    });

    let objects = match decoded {
        Ok(objects) => objects,
        Err(message) => {
            tracing::warn!(kind = %kind, scope = ?scope, %message, "Config kind degraded");
            state.record(
                scope.namespace(),
                Diagnostic::for_kind(kind, scope.namespace(), message),
            );
            return;
        }
    };

    match scope {
        Scope::Namespace(ns) => {
            state.mark_fetched(ns, kind);
            if let Some(list) = state.list_mut(ns) {
                for object in objects {
                    list.push_or_record(object);
                }
            }
        }
        Scope::All => {
            let namespaces: Vec<String> = state.namespaces().map(str::to_string).collect();
            for ns in &namespaces {
                state.mark_fetched(ns, kind);
            }
            for object in objects {
                let ns = object.namespace().to_string();
                match state.list_mut(&ns) {
                    Some(list) => list.push_or_record(object),
                    None => tracing::debug!(
                        kind = %kind,
                        namespace = %ns,
                        name = object.name(),
                        "Skipping object outside the collected namespaces"
                    ),
                }
            }
        }
    }
}
