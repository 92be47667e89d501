//! # ClusterOperator Reconcile Tests

mod common;

use common::*;
use cluster_capi_operator::controller::{Outcome, Reconcile};

#[tokio::test]
async fn test_enabled_feature_set() {
    let store = std::sync::Arc::new(cluster_capi_operator::store::InMemoryStore::new());
    store.insert(&feature_gate("TechPreviewNoUpgrade")).unwrap();
    let reconciler = cluster_operator_reconciler(&store, &config());

    assert_eq!(
        reconciler.assess().await.unwrap(),
        Outcome::available("Cluster API is enabled")
    );
    reconciler.reconcile().await.unwrap();
    assert_eq!(
        condition_status(&store, "ClusterOperatorControllerAvailable").as_deref(),
        Some("True")
    );
}

#[tokio::test]
async fn test_default_feature_set_disables_cluster_api() {
    let store = std::sync::Arc::new(cluster_capi_operator::store::InMemoryStore::new());
    store.insert(&feature_gate("")).unwrap();
    let reconciler = cluster_operator_reconciler(&store, &config());

    assert_eq!(
        reconciler.assess().await.unwrap(),
        Outcome::available("Cluster API is disabled by feature set Default")
    );
    reconciler.reconcile().await.unwrap();
    assert_eq!(condition_status(&store, "Available").as_deref(), Some("True"));
}

#[tokio::test]
async fn test_missing_feature_gate_is_degraded() {
    let store = std::sync::Arc::new(cluster_capi_operator::store::InMemoryStore::new());
    let reconciler = cluster_operator_reconciler(&store, &config());

    let err = reconciler.reconcile().await.unwrap_err();
    assert_eq!(err.reason(), "NotFound");
    assert_eq!(
        condition_status(&store, "ClusterOperatorControllerDegraded").as_deref(),
        Some("True")
    );
}

#[tokio::test]
async fn test_repeated_reconcile_does_not_rewrite_status() {
    let store = std::sync::Arc::new(cluster_capi_operator::store::InMemoryStore::new());
    store.insert(&feature_gate("CustomNoUpgrade")).unwrap();
    let reconciler = cluster_operator_reconciler(&store, &config());

    reconciler.reconcile().await.unwrap();
    let writes = store.write_count::<cluster_capi_operator::crd::ClusterOperator>(None, "cluster-api");
    reconciler.reconcile().await.unwrap();
    reconciler.reconcile().await.unwrap();
    assert_eq!(
        store.write_count::<cluster_capi_operator::crd::ClusterOperator>(None, "cluster-api"),
        writes
    );
}
