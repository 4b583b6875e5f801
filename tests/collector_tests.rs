//! Collection against the in-memory fixture cluster

mod common;

use common::{FixtureCluster, bookinfo};
use meshcfg::EngineError;
use meshcfg::collector::{Collector, DEFAULT_REQUEST_TIMEOUT, ListOptions};
use meshcfg::models::ConfigKind;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn collector(cluster: &FixtureCluster, timeout: Duration) -> Collector {
    Collector::new(Arc::new(cluster.clone()), timeout)
}

#[tokio::test]
async fn test_objects_belong_to_their_listing() {
    let cluster = bookinfo();
    cluster.apply(json!({
        "apiVersion": "networking.istio.io/v1",
        "kind": "Sidecar",
        "metadata": {"name": "default", "namespace": "istio-system"},
        "spec": {"egress": [{"hosts": ["./*"]}]}
    }));

    let state = collector(&cluster, DEFAULT_REQUEST_TIMEOUT)
        .fetch_all(&ListOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.lists.len(), 2);
    for (ns, list) in &state.lists {
        for obj in list.objects() {
            assert_eq!(obj.namespace(), ns);
            assert!(!obj.name().is_empty());
        }
    }
    assert_eq!(state.list("bookinfo").unwrap().total(), 5);
    assert_eq!(state.list("istio-system").unwrap().sidecars.len(), 1);
}

#[tokio::test]
async fn test_unknown_namespace() {
    let err = collector(&bookinfo(), DEFAULT_REQUEST_TIMEOUT)
        .fetch_namespace("nope", &ListOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NamespaceNotFound("nope".into()));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_kind_filter_and_label_selector() {
    let cluster = bookinfo();
    cluster.apply(json!({
        "apiVersion": "networking.istio.io/v1",
        "kind": "VirtualService",
        "metadata": {"name": "canary", "namespace": "bookinfo", "labels": {"team": "canary"}},
        "spec": {"hosts": ["reviews"]}
    }));

    let options = ListOptions {
        kinds: BTreeSet::from([ConfigKind::VirtualService]),
        label_selector: Some("team=canary".to_string()),
        include_validations: false,
    };
    let state = collector(&cluster, DEFAULT_REQUEST_TIMEOUT)
        .fetch_namespace("bookinfo", &options, &CancellationToken::new())
        .await
        .unwrap();

    let list = state.list("bookinfo").unwrap();
    assert_eq!(list.virtual_services.len(), 1);
    assert_eq!(list.virtual_services[0].metadata.name.as_deref(), Some("canary"));
    assert!(list.gateways.is_empty());
    assert!(!state.kind_fetched("bookinfo", ConfigKind::Gateway));
}

#[tokio::test]
async fn test_failed_kind_is_a_diagnostic() {
    let cluster = bookinfo();
    cluster.fail_kind(ConfigKind::EnvoyFilter);

    let state = collector(&cluster, DEFAULT_REQUEST_TIMEOUT)
        .fetch_namespace("bookinfo", &ListOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let list = state.list("bookinfo").unwrap();
    assert_eq!(list.total(), 5);
    assert_eq!(list.diagnostics.len(), 1);
    assert_eq!(list.diagnostics[0].subject, "envoyfilters");
}

#[tokio::test]
async fn test_hung_kind_degrades_at_deadline() {
    let cluster = bookinfo();
    cluster.hang_kind(ConfigKind::Sidecar);

    let state = collector(&cluster, Duration::from_millis(200))
        .fetch_namespace("bookinfo", &ListOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let list = state.list("bookinfo").unwrap();
    assert_eq!(list.virtual_services.len(), 2);
    assert_eq!(list.diagnostics.len(), 1);
    assert_eq!(list.diagnostics[0].subject, "sidecars");
    assert_eq!(list.diagnostics[0].message, "deadline exceeded");
}

#[tokio::test]
async fn test_cancellation_before_completion() {
    let cluster = bookinfo();
    cluster.hang_kind(ConfigKind::VirtualService);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = collector(&cluster, DEFAULT_REQUEST_TIMEOUT)
        .fetch_namespace("bookinfo", &ListOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
}
