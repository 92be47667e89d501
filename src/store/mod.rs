//! # Resource Store
//!
//! The typed get / create / replace operations the reconcile loops need from
//! the API server, behind the [`ResourceStore`] trait.
//!
//! - `kube_store.rs` - [`KubeStore`], backed by `kube::Api`
//! - `memory.rs` - `InMemoryStore`, a versioned map used by tests (only
//!   built for unit tests or with the `test-util` feature)
//!
//! Every write carries the `resourceVersion` of the object it was computed
//! from; a stale version is rejected with [`StoreError::Conflict`]. This is
//! the only concurrency primitive the operator relies on.

mod kube_store;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use kube_store::KubeStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryStore;

use crate::crd::{ClusterOperator, FeatureGate, Infrastructure};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors returned by a [`ResourceStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object changed since it was read
    #[error("{kind} {name} was modified concurrently")]
    Conflict { kind: String, name: String },
    /// Create of an object that already exists
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },
    /// Write to an object that does not exist
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    /// Object passed to a write has no name
    #[error("{kind} object has no name")]
    MissingName { kind: String },
    /// Store could not be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Error returned by the Kubernetes API
    #[error("Kubernetes API request failed: {0}")]
    Kube(#[from] kube::Error),
    /// Object could not be converted to or from JSON
    #[error("failed to convert object: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Unavailable(_) | StoreError::Kube(_)
        )
    }
}

/// A resource kind the store can hold
///
/// Implemented for every kind the operator touches. `api` builds a handle
/// scoped the way the kind is scoped; cluster-scoped kinds ignore the
/// namespace.
pub trait StoreResource:
    Resource<DynamicType = ()>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! cluster_scoped {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreResource for $kind {
                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )*
    };
}

macro_rules! namespace_scoped {
    ($($kind:ty),* $(,)?) => {
        $(
            impl StoreResource for $kind {
                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    Api::namespaced(client, namespace.unwrap_or("default"))
                }
            }
        )*
    };
}

cluster_scoped!(ClusterOperator, FeatureGate, Infrastructure);
namespace_scoped!(Secret, ServiceAccount);

/// Typed access to the versioned object store
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read an object. `Ok(None)` when it does not exist.
    async fn get<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError>;

    /// Create an object. Fails with [`StoreError::AlreadyExists`] if present.
    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace an object. When `obj` carries a `resourceVersion` the write
    /// only succeeds if it still matches, else [`StoreError::Conflict`].
    /// The status of the stored object is left alone.
    async fn replace<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace the status of an object under the same version check as
    /// [`ResourceStore::replace`]. Everything outside `status` is left alone.
    async fn replace_status<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError>;
}

/// Kind name of a store resource, for error messages and keys
pub(crate) fn kind_of<K: StoreResource>() -> String {
    K::kind(&()).into_owned()
}

/// Name of an object about to be written
pub(crate) fn name_of<K: StoreResource>(obj: &K) -> Result<String, StoreError> {
    obj.meta()
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StoreError::MissingName { kind: kind_of::<K>() })
}

/// `namespace/name` or `name` for log fields
pub fn display_key<K: ResourceExt>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{}/{}", ns, obj.name_any()),
        None => obj.name_any(),
    }
}
