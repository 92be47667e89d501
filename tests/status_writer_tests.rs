//! # Status Writer Tests
//!
//! Concurrent and conflicting writes to the shared ClusterOperator status.

mod common;

use common::*;
use cluster_capi_operator::controller::{Outcome, StatusError, StatusWriter};
use cluster_capi_operator::crd::{ClusterOperator, ClusterOperatorSpec, ConditionStatus};
use cluster_capi_operator::store::InMemoryStore;
use std::sync::Arc;

fn writer(store: &Arc<InMemoryStore>) -> StatusWriter<InMemoryStore> {
    StatusWriter::new(Arc::clone(store), &config())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_keep_each_others_entries() {
    let store = Arc::new(InMemoryStore::new());
    let config = cluster_capi_operator::config::ControllerConfig {
        status_max_attempts: 50,
        conflict_retry_base_ms: 1,
        ..cluster_capi_operator::config::ControllerConfig::default()
    };

    let mut handles = Vec::new();
    for controller in ["Kubeconfig", "ClusterOperator", "Third"] {
        let writer = StatusWriter::new(Arc::clone(&store), &config);
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                let outcome = if i % 2 == 0 {
                    Outcome::degraded("Flapping", format!("{controller} attempt {i}"))
                } else {
                    Outcome::available(format!("{controller} attempt {i}"))
                };
                writer.report(controller, &outcome).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let status = cluster_operator(&store).status.unwrap();
    for controller in ["Kubeconfig", "ClusterOperator", "Third"] {
        let available = status
            .condition(&format!("{controller}ControllerAvailable"))
            .unwrap();
        // The last report of every writer was Available
        assert_eq!(available.status, ConditionStatus::True);
        assert_eq!(
            available.message.as_deref(),
            Some(format!("{controller} attempt 9").as_str())
        );
    }
    assert_eq!(status.condition("Available").unwrap().status, ConditionStatus::True);
    assert_eq!(status.condition("Degraded").unwrap().status, ConditionStatus::False);
}

#[tokio::test]
async fn test_other_controllers_entries_survive() {
    let store = Arc::new(InMemoryStore::new());
    let writer = writer(&store);

    writer
        .report("Kubeconfig", &Outcome::degraded("NotFound", "Infrastructure cluster not found"))
        .await
        .unwrap();
    writer
        .report("ClusterOperator", &Outcome::available("Cluster API is enabled"))
        .await
        .unwrap();

    let status = cluster_operator(&store).status.unwrap();
    assert_eq!(
        status.condition("KubeconfigControllerDegraded").unwrap().status,
        ConditionStatus::True
    );
    assert_eq!(
        status.condition("ClusterOperatorControllerAvailable").unwrap().status,
        ConditionStatus::True
    );
    assert_eq!(status.condition("Degraded").unwrap().status, ConditionStatus::True);
    assert_eq!(status.condition("Available").unwrap().status, ConditionStatus::False);
}

#[tokio::test]
async fn test_injected_conflicts_are_retried() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(&ClusterOperator::new("cluster-api", ClusterOperatorSpec {}))
        .unwrap();
    store.inject_status_conflicts::<ClusterOperator>(3);

    writer(&store)
        .report("Kubeconfig", &Outcome::available(""))
        .await
        .unwrap();
    assert_eq!(
        condition_status(&store, "KubeconfigControllerAvailable").as_deref(),
        Some("True")
    );
}

#[tokio::test]
async fn test_exhausted_retries_surface_error() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(&ClusterOperator::new("cluster-api", ClusterOperatorSpec {}))
        .unwrap();
    store.inject_status_conflicts::<ClusterOperator>(50);

    let err = writer(&store)
        .report("Kubeconfig", &Outcome::available(""))
        .await
        .unwrap_err();
    assert!(matches!(err, StatusError::RetriesExhausted { attempts: 5 }));
    assert!(cluster_operator(&store).status.is_none());
}

#[tokio::test]
async fn test_transition_time_kept_across_reports() {
    let store = Arc::new(InMemoryStore::new());
    let writer = writer(&store);

    writer
        .report("Kubeconfig", &Outcome::available("first"))
        .await
        .unwrap();
    let first = cluster_operator(&store).status.unwrap();
    let first_time = first
        .condition("KubeconfigControllerAvailable")
        .unwrap()
        .last_transition_time
        .clone();

    writer
        .report("Kubeconfig", &Outcome::available("second"))
        .await
        .unwrap();
    let second = cluster_operator(&store).status.unwrap();
    let condition = second.condition("KubeconfigControllerAvailable").unwrap();
    assert_eq!(condition.message.as_deref(), Some("second"));
    assert_eq!(condition.last_transition_time, first_time);
}

#[tokio::test]
async fn test_versions_and_related_objects_are_restored() {
    let store = Arc::new(InMemoryStore::new());
    let writer = writer(&store);
    writer.report("Kubeconfig", &Outcome::available("")).await.unwrap();

    let mut tampered = cluster_operator(&store);
    if let Some(status) = tampered.status.as_mut() {
        status.versions.clear();
        status.related_objects.clear();
    }
    tampered.metadata.resource_version = None;
    store.insert(&tampered).unwrap();

    writer.report("Kubeconfig", &Outcome::available("")).await.unwrap();
    let status = cluster_operator(&store).status.unwrap();
    assert_eq!(status.versions.len(), 1);
    assert_eq!(status.versions[0].version, "0.0.1-snapshot");
    assert!(status
        .related_objects
        .iter()
        .any(|r| r.resource == "clusteroperators" && r.name == "cluster-api"));
}
