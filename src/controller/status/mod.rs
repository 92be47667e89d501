//! # Aggregate Status Writer
//!
//! Every reconcile loop reports its outcome on the shared `cluster-api`
//! `ClusterOperator`. Writes are read-modify-write cycles guarded by the
//! `resourceVersion` of the read: a loop only replaces its own condition
//! entries, recomputes the aggregate conditions and retries from a fresh
//! read when another writer got there first.

pub mod conditions;

use crate::config::ControllerConfig;
use crate::constants::{CLUSTER_OPERATOR_NAME, OPERATOR_VERSION_NAME};
use crate::crd::{
    ClusterOperator, ClusterOperatorSpec, ClusterOperatorStatus, ObjectReference, OperandVersion,
};
use crate::observability;
use crate::store::{ResourceStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const MAX_CONFLICT_PAUSE: Duration = Duration::from_secs(2);

/// Result of one reconcile, as recorded on the ClusterOperator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Available { message: String },
    Degraded { reason: String, message: String },
}

impl Outcome {
    pub fn available(message: impl Into<String>) -> Self {
        Outcome::Available {
            message: message.into(),
        }
    }

    pub fn degraded(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Outcome::Degraded {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Outcome::Available { .. })
    }
}

/// Errors of the status writer
#[derive(Debug, Error)]
pub enum StatusError {
    /// Every attempt lost against a concurrent writer
    #[error("status of ClusterOperator cluster-api still conflicting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes controller outcomes onto the shared ClusterOperator
#[derive(Debug)]
pub struct StatusWriter<S> {
    store: Arc<S>,
    release_version: String,
    related_objects: Vec<ObjectReference>,
    max_attempts: u32,
    retry_base: Duration,
}

impl<S: ResourceStore> StatusWriter<S> {
    pub fn new(store: Arc<S>, config: &ControllerConfig) -> Self {
        Self {
            store,
            release_version: config.release_version.clone(),
            related_objects: related_objects(config),
            max_attempts: config.status_max_attempts.max(1),
            retry_base: config.conflict_retry_base(),
        }
    }

    /// Record `outcome` as the current assessment of `controller`
    ///
    /// Returns once the status reflects the outcome, either written by this
    /// call or already present.
    pub async fn report(&self, controller: &str, outcome: &Outcome) -> Result<(), StatusError> {
        for attempt in 1..=self.max_attempts {
            let current = self.read_or_create().await?;
            let desired = self.desired_status(current.status.as_ref(), controller, outcome);

            if current.status.as_ref() == Some(&desired) {
                debug!(controller, "ClusterOperator status unchanged, skipping write");
                return Ok(());
            }

            let mut updated = current;
            updated.status = Some(desired);
            match self.store.replace_status(&updated).await {
                Ok(_) => {
                    info!(
                        controller,
                        available = outcome.is_available(),
                        "updated ClusterOperator status"
                    );
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    observability::metrics::increment_status_write_conflicts();
                    if attempt == self.max_attempts {
                        error!(
                            controller,
                            attempts = self.max_attempts,
                            "ClusterOperator status still changing concurrently, giving up"
                        );
                        break;
                    }
                    let pause = self.retry_pause(attempt);
                    warn!(
                        controller,
                        attempt,
                        max_attempts = self.max_attempts,
                        pause_ms = pause.as_millis(),
                        "ClusterOperator status changed concurrently, retrying"
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StatusError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }

    async fn read_or_create(&self) -> Result<ClusterOperator, StatusError> {
        if let Some(existing) = self
            .store
            .get::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME)
            .await?
        {
            return Ok(existing);
        }

        info!("ClusterOperator {CLUSTER_OPERATOR_NAME} not found, creating it");
        let bare = ClusterOperator::new(CLUSTER_OPERATOR_NAME, ClusterOperatorSpec {});
        match self.store.create(&bare).await {
            Ok(_) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e.into()),
        }

        self.store
            .get::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME)
            .await?
            .ok_or_else(|| {
                StatusError::Store(StoreError::NotFound {
                    kind: "ClusterOperator".to_string(),
                    name: CLUSTER_OPERATOR_NAME.to_string(),
                })
            })
    }

    fn desired_status(
        &self,
        current: Option<&ClusterOperatorStatus>,
        controller: &str,
        outcome: &Outcome,
    ) -> ClusterOperatorStatus {
        let mut status = current.cloned().unwrap_or_default();
        let now = chrono::Utc::now().to_rfc3339();

        for condition in conditions::owned_conditions(controller, outcome) {
            conditions::set_condition(&mut status.conditions, condition, &now);
        }
        for condition in conditions::aggregate_conditions(&status.conditions) {
            conditions::set_condition(&mut status.conditions, condition, &now);
        }

        status.versions = vec![OperandVersion {
            name: OPERATOR_VERSION_NAME.to_string(),
            version: self.release_version.clone(),
        }];
        status.related_objects.clone_from(&self.related_objects);
        status
    }

    fn retry_pause(&self, attempt: u32) -> Duration {
        self.retry_base
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
            .min(MAX_CONFLICT_PAUSE)
    }
}

fn related_objects(config: &ControllerConfig) -> Vec<ObjectReference> {
    let mut namespaces = vec![config.managed_namespace.clone()];
    if config.operator_namespace != config.managed_namespace {
        namespaces.push(config.operator_namespace.clone());
    }

    namespaces
        .into_iter()
        .map(|name| ObjectReference {
            group: String::new(),
            resource: "namespaces".to_string(),
            namespace: None,
            name,
        })
        .chain(std::iter::once(ObjectReference {
            group: "config.openshift.io".to_string(),
            resource: "clusteroperators".to_string(),
            namespace: None,
            name: CLUSTER_OPERATOR_NAME.to_string(),
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ConditionStatus;
    use crate::store::InMemoryStore;

    fn writer(store: &Arc<InMemoryStore>, max_attempts: u32) -> StatusWriter<InMemoryStore> {
        let config = ControllerConfig {
            status_max_attempts: max_attempts,
            conflict_retry_base_ms: 1,
            ..ControllerConfig::default()
        };
        StatusWriter::new(Arc::clone(store), &config)
    }

    fn stored(store: &InMemoryStore) -> ClusterOperatorStatus {
        store
            .object::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME)
            .and_then(|co| co.status)
            .unwrap()
    }

    #[tokio::test]
    async fn test_report_creates_cluster_operator() {
        let store = Arc::new(InMemoryStore::new());
        writer(&store, 3)
            .report("Kubeconfig", &Outcome::available(""))
            .await
            .unwrap();

        let status = stored(&store);
        assert_eq!(
            status.condition("KubeconfigControllerAvailable").unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(status.condition("Available").unwrap().status, ConditionStatus::True);
        assert_eq!(status.versions[0].name, "operator");
        assert_eq!(status.related_objects.len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_outcome_is_not_rewritten() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(&store, 3);
        writer.report("Kubeconfig", &Outcome::available("")).await.unwrap();
        let writes = store.write_count::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME);

        writer.report("Kubeconfig", &Outcome::available("")).await.unwrap();
        assert_eq!(
            store.write_count::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME),
            writes
        );
    }

    #[tokio::test]
    async fn test_retry_pause_doubles() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(&store, 3);
        assert_eq!(writer.retry_pause(1), Duration::from_millis(1));
        assert_eq!(writer.retry_pause(2), Duration::from_millis(2));
        assert_eq!(writer.retry_pause(4), Duration::from_millis(8));
        assert_eq!(writer.retry_pause(40), MAX_CONFLICT_PAUSE);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_error() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&ClusterOperator::new(CLUSTER_OPERATOR_NAME, ClusterOperatorSpec {})).unwrap();
        store.inject_status_conflicts::<ClusterOperator>(10);

        let err = writer(&store, 3)
            .report("Kubeconfig", &Outcome::available(""))
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::RetriesExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_exhaustion_stops_after_last_attempt() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&ClusterOperator::new(CLUSTER_OPERATOR_NAME, ClusterOperatorSpec {})).unwrap();
        store.inject_status_conflicts::<ClusterOperator>(3);
        let writer = writer(&store, 3);

        let err = writer
            .report("Kubeconfig", &Outcome::available(""))
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::RetriesExhausted { attempts: 3 }));
        assert_eq!(store.write_count::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME), 0);

        // Exactly three writes were attempted, so the next report lands first time
        writer
            .report("Kubeconfig", &Outcome::available(""))
            .await
            .unwrap();
        assert_eq!(store.write_count::<ClusterOperator>(None, CLUSTER_OPERATOR_NAME), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_pause() {
        let store = Arc::new(InMemoryStore::new());
        store.insert(&ClusterOperator::new(CLUSTER_OPERATOR_NAME, ClusterOperatorSpec {})).unwrap();
        store.inject_status_conflicts::<ClusterOperator>(1);
        let config = ControllerConfig {
            status_max_attempts: 1,
            conflict_retry_base_ms: 60_000,
            ..ControllerConfig::default()
        };
        let writer = StatusWriter::new(Arc::clone(&store), &config);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            writer.report("Kubeconfig", &Outcome::available("")),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(StatusError::RetriesExhausted { attempts: 1 })));
    }
}
