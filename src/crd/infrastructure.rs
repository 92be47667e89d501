//! # Infrastructure
//!
//! Cluster-wide platform topology record. The singleton is named `cluster`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Infrastructure holds cluster-wide information about the underlying platform
///
/// # Example
///
/// ```yaml
/// apiVersion: config.openshift.io/v1
/// kind: Infrastructure
/// metadata:
///   name: cluster
/// status:
///   infrastructureName: test-x7k2p
///   platformStatus:
///     type: AWS
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "Infrastructure",
    group = "config.openshift.io",
    version = "v1",
    plural = "infrastructures",
    status = "InfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Cloud configuration reference, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_config: Option<CloudConfigReference>,
}

/// Reference to the config map carrying the cloud provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudConfigReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

/// Observed platform state
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Unique, human friendly cluster identifier. Used as the Cluster API
    /// cluster name.
    #[serde(default)]
    pub infrastructure_name: String,
    /// Platform specific status. Absent on clusters installed before the
    /// field existed, or on platforms without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_status: Option<PlatformStatus>,
    /// External API server URL
    #[serde(default, rename = "apiServerURL")]
    pub api_server_url: String,
    /// Internal API server URI
    #[serde(default, rename = "apiServerInternalURI")]
    pub api_server_internal_uri: String,
}

/// Platform status
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    /// Platform type, e.g. `AWS`, `GCP`, `BareMetal`
    pub r#type: String,
}

impl Infrastructure {
    /// Platform type in lowercase, if the platform status is present
    pub fn platform_type(&self) -> Option<String> {
        self.status
            .as_ref()
            .and_then(|s| s.platform_status.as_ref())
            .map(|p| p.r#type.to_lowercase())
    }
}
