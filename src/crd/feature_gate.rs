//! # FeatureGate
//!
//! Cluster-wide feature enablement record. The singleton is named `cluster`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// FeatureGate selects the set of features enabled on the cluster
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "FeatureGate",
    group = "config.openshift.io",
    version = "v1",
    plural = "featuregates"
)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateSpec {
    /// Named feature set. Empty means the default set.
    #[serde(default)]
    pub feature_set: String,
}
