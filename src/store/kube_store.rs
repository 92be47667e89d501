//! # Kubernetes Store
//!
//! [`ResourceStore`] backed by the API server.

use super::{kind_of, name_of, ResourceStore, StoreError, StoreResource};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

/// Store backed by a Kubernetes client
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(FIELD_MANAGER.to_string()),
    }
}

/// Map API errors of a write onto the store taxonomy
fn classify_write_error<K: StoreResource>(
    error: kube::Error,
    name: &str,
    on_conflict: fn(String, String) -> StoreError,
) -> StoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 409 => on_conflict(kind_of::<K>(), name.to_string()),
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
            kind: kind_of::<K>(),
            name: name.to_string(),
        },
        other => StoreError::Kube(other),
    }
}

fn conflict(kind: String, name: String) -> StoreError {
    StoreError::Conflict { kind, name }
}

fn already_exists(kind: String, name: String) -> StoreError {
    StoreError::AlreadyExists { kind, name }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        let api = K::api(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let name = name_of(obj)?;
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());
        debug!(kind = %kind_of::<K>(), name = %name, "creating object");
        api.create(&post_params(), obj)
            .await
            .map_err(|e| classify_write_error::<K>(e, &name, already_exists))
    }

    async fn replace<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let name = name_of(obj)?;
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());
        debug!(
            kind = %kind_of::<K>(),
            name = %name,
            resource_version = ?obj.meta().resource_version,
            "replacing object"
        );
        api.replace(&name, &post_params(), obj)
            .await
            .map_err(|e| classify_write_error::<K>(e, &name, conflict))
    }

    async fn replace_status<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let name = name_of(obj)?;
        let api = K::api(self.client.clone(), obj.meta().namespace.as_deref());

        // A merge patch that carries metadata.resourceVersion is rejected with
        // 409 when the stored version moved on.
        let mut value = serde_json::to_value(obj)?;
        let status = value
            .get_mut("status")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.meta().resource_version },
            "status": status,
        });

        debug!(
            kind = %kind_of::<K>(),
            name = %name,
            resource_version = ?obj.meta().resource_version,
            "writing status"
        );
        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(patch),
        )
        .await
        .map_err(|e| classify_write_error::<K>(e, &name, conflict))
    }
}
