//! # ClusterOperator Reconciler
//!
//! Keeps the operator's own entries on the `cluster-api` ClusterOperator in
//! line with the cluster feature set. Also runs whenever the ClusterOperator
//! itself changes, so versions and related objects are restored if someone
//! edits them.

use crate::config::ControllerConfig;
use crate::constants::FEATURE_GATE_NAME;
use crate::controller::status::{Outcome, StatusWriter};
use crate::controller::{Reconcile, ReconcilerError};
use crate::crd::FeatureGate;
use crate::store::ResourceStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

pub const CONTROLLER_NAME: &str = "ClusterOperator";

#[derive(Debug)]
pub struct ClusterOperatorReconciler<S> {
    store: Arc<S>,
    status: Arc<StatusWriter<S>>,
    config: Arc<ControllerConfig>,
}

impl<S: ResourceStore> ClusterOperatorReconciler<S> {
    pub fn new(store: Arc<S>, status: Arc<StatusWriter<S>>, config: Arc<ControllerConfig>) -> Self {
        Self {
            store,
            status,
            config,
        }
    }

    /// Outcome for the current feature set
    pub async fn assess(&self) -> Result<Outcome, ReconcilerError> {
        let gate = self
            .store
            .get::<FeatureGate>(None, FEATURE_GATE_NAME)
            .await?
            .ok_or_else(|| ReconcilerError::not_found("FeatureGate", FEATURE_GATE_NAME))?;

        let feature_set = gate.spec.feature_set.as_str();
        if self.config.is_feature_set_enabled(feature_set) {
            info!(feature_set, "Cluster API is enabled");
            Ok(Outcome::available("Cluster API is enabled"))
        } else {
            let shown = if feature_set.is_empty() { "Default" } else { feature_set };
            info!(feature_set = shown, "Cluster API is disabled by feature set");
            Ok(Outcome::available(format!(
                "Cluster API is disabled by feature set {shown}"
            )))
        }
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile for ClusterOperatorReconciler<S> {
    fn name(&self) -> &'static str {
        CONTROLLER_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcilerError> {
        match self.assess().await {
            Ok(outcome) => {
                self.status.report(CONTROLLER_NAME, &outcome).await?;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, reason = e.reason(), "Error reading FeatureGate");
                self.status
                    .report(CONTROLLER_NAME, &Outcome::degraded(e.reason(), e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }
}
