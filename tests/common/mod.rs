//! Shared fixtures for the integration tests.

#![allow(dead_code, reason = "Not every test binary uses every fixture")]

use cluster_capi_operator::config::ControllerConfig;
use cluster_capi_operator::controller::{
    ClusterOperatorReconciler, KubeconfigReconciler, StatusWriter,
};
use cluster_capi_operator::crd::{
    ClusterOperator, FeatureGate, FeatureGateSpec, Infrastructure, InfrastructureSpec,
    InfrastructureStatus, PlatformStatus,
};
use cluster_capi_operator::store::InMemoryStore;
use k8s_openapi::api::core::v1::{ObjectReference, Secret, ServiceAccount};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "openshift-cluster-api";
pub const TOKEN_SECRET: &str = "cluster-capi-operator-token-x7k2p";
pub const ENDPOINT: &str = "https://example.com";

pub fn config() -> Arc<ControllerConfig> {
    Arc::new(ControllerConfig {
        conflict_retry_base_ms: 1,
        ..ControllerConfig::default()
    })
}

pub fn infrastructure(platform: Option<&str>, cluster_name: &str) -> Infrastructure {
    let mut infra = Infrastructure::new("cluster", InfrastructureSpec::default());
    infra.status = Some(InfrastructureStatus {
        infrastructure_name: cluster_name.to_string(),
        platform_status: platform.map(|p| PlatformStatus {
            r#type: p.to_string(),
        }),
        ..InfrastructureStatus::default()
    });
    infra
}

pub fn feature_gate(feature_set: &str) -> FeatureGate {
    FeatureGate::new(
        "cluster",
        FeatureGateSpec {
            feature_set: feature_set.to_string(),
        },
    )
}

pub fn service_account(secret_refs: &[&str]) -> ServiceAccount {
    ServiceAccount {
        metadata: ObjectMeta {
            name: Some("cluster-capi-operator".to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        secrets: Some(
            secret_refs
                .iter()
                .map(|name| ObjectReference {
                    name: Some((*name).to_string()),
                    ..ObjectReference::default()
                })
                .collect(),
        ),
        ..ServiceAccount::default()
    }
}

pub fn token_secret(name: &str, token: &[u8], ca: &[u8]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([
            ("token".to_string(), ByteString(token.to_vec())),
            ("ca.crt".to_string(), ByteString(ca.to_vec())),
        ])),
        type_: Some("kubernetes.io/service-account-token".to_string()),
        ..Secret::default()
    }
}

/// Store seeded with working credentials for the operator service account
pub fn store_with_credentials() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert(&service_account(&[
            "cluster-capi-operator-dockercfg-abcde",
            TOKEN_SECRET,
        ]))
        .unwrap();
    store
        .insert(&token_secret(TOKEN_SECRET, b"dGVzdA==", b"dGVzdA=="))
        .unwrap();
    store
}

pub fn kubeconfig_reconciler(
    store: &Arc<InMemoryStore>,
    config: &Arc<ControllerConfig>,
) -> KubeconfigReconciler<InMemoryStore> {
    let status = Arc::new(StatusWriter::new(Arc::clone(store), config));
    KubeconfigReconciler::new(Arc::clone(store), status, Arc::clone(config), ENDPOINT)
}

pub fn cluster_operator_reconciler(
    store: &Arc<InMemoryStore>,
    config: &Arc<ControllerConfig>,
) -> ClusterOperatorReconciler<InMemoryStore> {
    let status = Arc::new(StatusWriter::new(Arc::clone(store), config));
    ClusterOperatorReconciler::new(Arc::clone(store), status, Arc::clone(config))
}

pub fn cluster_operator(store: &InMemoryStore) -> ClusterOperator {
    store
        .object::<ClusterOperator>(None, "cluster-api")
        .expect("ClusterOperator should exist")
}

pub fn condition_status(store: &InMemoryStore, condition_type: &str) -> Option<String> {
    cluster_operator(store)
        .status
        .and_then(|s| s.condition(condition_type).cloned())
        .map(|c| format!("{:?}", c.status))
}
