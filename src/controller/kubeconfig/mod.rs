//! # Kubeconfig Reconciler
//!
//! Maintains the `<cluster>-kubeconfig` Secret Cluster API uses to reach the
//! management cluster. The kubeconfig authenticates as the operator's own
//! service account and is rebuilt from freshly read state on every run.

mod generate;

pub use generate::{
    generate_kubeconfig, GenerateError, KubeconfigAuthInfo, KubeconfigCluster, KubeconfigContext,
    KubeconfigDocument, KubeconfigOptions,
};

use crate::config::ControllerConfig;
use crate::constants::{
    CLUSTER_NAME_LABEL, CLUSTER_SECRET_TYPE, INFRASTRUCTURE_RESOURCE_NAME,
    KUBECONFIG_SECRET_DATA_KEY, KUBECONFIG_SECRET_SUFFIX, SERVICE_ACCOUNT_NAME,
    TOKEN_SECRET_CA_KEY, TOKEN_SECRET_TOKEN_KEY,
};
use crate::controller::status::{Outcome, StatusWriter};
use crate::controller::upsert::{copy_secret_owned_fields, create_or_update, UpsertOutcome};
use crate::controller::{Reconcile, ReconcilerError};
use crate::crd::Infrastructure;
use crate::observability;
use crate::store::ResourceStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Name the loop reports under on the ClusterOperator
pub const CONTROLLER_NAME: &str = "Kubeconfig";

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSync {
    /// Platform status is missing
    NoPlatformStatus,
    /// Platform is not in the supported set
    UnsupportedPlatform(String),
    /// The Secret was converged
    Converged {
        secret_name: String,
        outcome: UpsertOutcome,
    },
}

impl KubeconfigSync {
    fn message(&self) -> String {
        match self {
            KubeconfigSync::NoPlatformStatus => {
                "No platform status on Infrastructure, kubeconfig not managed".to_string()
            }
            KubeconfigSync::UnsupportedPlatform(platform) => {
                format!("Platform {platform} is not supported, kubeconfig not managed")
            }
            KubeconfigSync::Converged { secret_name, .. } => {
                format!("Kubeconfig secret {secret_name} is up to date")
            }
        }
    }
}

/// Reconciles the kubeconfig Secret
#[derive(Debug)]
pub struct KubeconfigReconciler<S> {
    store: Arc<S>,
    status: Arc<StatusWriter<S>>,
    config: Arc<ControllerConfig>,
    api_server_endpoint: String,
}

impl<S: ResourceStore> KubeconfigReconciler<S> {
    pub fn new(
        store: Arc<S>,
        status: Arc<StatusWriter<S>>,
        config: Arc<ControllerConfig>,
        api_server_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            store,
            status,
            config,
            api_server_endpoint: api_server_endpoint.into(),
        }
    }

    /// Converge the Secret without reporting status
    pub async fn sync(&self) -> Result<KubeconfigSync, ReconcilerError> {
        let infra = self
            .store
            .get::<Infrastructure>(None, INFRASTRUCTURE_RESOURCE_NAME)
            .await?
            .ok_or_else(|| {
                ReconcilerError::not_found("Infrastructure", INFRASTRUCTURE_RESOURCE_NAME)
            })?;

        let Some(platform) = infra.platform_type() else {
            info!("No platform status in Infrastructure, skipping kubeconfig reconciliation");
            return Ok(KubeconfigSync::NoPlatformStatus);
        };
        if !self.config.is_platform_supported(&platform) {
            info!(platform = %platform, "Platform type is not supported, skipping kubeconfig reconciliation");
            return Ok(KubeconfigSync::UnsupportedPlatform(platform));
        }

        let cluster_name = infra
            .status
            .as_ref()
            .map(|s| s.infrastructure_name.clone())
            .unwrap_or_default();

        info!(cluster = %cluster_name, "Reconciling kubeconfig secret");
        let desired = self.desired_secret(&cluster_name).await?;
        let secret_name = format!("{cluster_name}-{KUBECONFIG_SECRET_SUFFIX}");

        let outcome = create_or_update(
            self.store.as_ref(),
            &desired,
            copy_secret_owned_fields,
            self.config.upsert_max_attempts,
        )
        .await?;
        observability::metrics::increment_kubeconfig_secret_upserts(outcome.as_str());
        info!(secret = %secret_name, outcome = %outcome, "Kubeconfig secret reconciled");

        Ok(KubeconfigSync::Converged {
            secret_name,
            outcome,
        })
    }

    async fn desired_secret(&self, cluster_name: &str) -> Result<Secret, ReconcilerError> {
        let namespace = self.config.managed_namespace.as_str();
        let token_secret = self.token_secret().await?;
        let data = token_secret.data.unwrap_or_default();
        let field = |key: &str| data.get(key).map(|b| b.0.as_slice()).unwrap_or_default();

        let kubeconfig = generate_kubeconfig(KubeconfigOptions {
            token: field(TOKEN_SECRET_TOKEN_KEY),
            ca_cert: field(TOKEN_SECRET_CA_KEY),
            api_server_endpoint: &self.api_server_endpoint,
            cluster_name,
            namespace,
        })?;
        let yaml = kubeconfig.to_yaml()?;

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(format!("{cluster_name}-{KUBECONFIG_SECRET_SUFFIX}")),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    CLUSTER_NAME_LABEL.to_string(),
                    cluster_name.to_string(),
                )])),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                KUBECONFIG_SECRET_DATA_KEY.to_string(),
                ByteString(yaml.to_vec()),
            )])),
            type_: Some(CLUSTER_SECRET_TYPE.to_string()),
            ..Secret::default()
        })
    }

    /// Token Secret of the operator's service account
    ///
    /// The last reference matching `<service account>-token` wins.
    async fn token_secret(&self) -> Result<Secret, ReconcilerError> {
        let namespace = self.config.managed_namespace.as_str();
        let service_account = self
            .store
            .get::<ServiceAccount>(Some(namespace), SERVICE_ACCOUNT_NAME)
            .await?
            .ok_or_else(|| ReconcilerError::not_found("ServiceAccount", SERVICE_ACCOUNT_NAME))?;

        let prefix = format!("{SERVICE_ACCOUNT_NAME}-token");
        let token_secret_name = service_account
            .secrets
            .iter()
            .flatten()
            .filter_map(|r| r.name.as_deref())
            .filter(|name| name.starts_with(&prefix))
            .last()
            .ok_or_else(|| ReconcilerError::not_found("Secret", &format!("{prefix}*")))?;

        self.store
            .get::<Secret>(Some(namespace), token_secret_name)
            .await?
            .ok_or_else(|| ReconcilerError::not_found("Secret", token_secret_name))
    }
}

#[async_trait]
impl<S: ResourceStore + 'static> Reconcile for KubeconfigReconciler<S> {
    fn name(&self) -> &'static str {
        CONTROLLER_NAME
    }

    async fn reconcile(&self) -> Result<(), ReconcilerError> {
        match self.sync().await {
            Ok(result) => {
                self.status
                    .report(CONTROLLER_NAME, &Outcome::available(result.message()))
                    .await?;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, reason = e.reason(), "Error reconciling kubeconfig");
                self.status
                    .report(CONTROLLER_NAME, &Outcome::degraded(e.reason(), e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }
}
