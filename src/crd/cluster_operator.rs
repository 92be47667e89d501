//! # ClusterOperator
//!
//! Aggregate health record of a platform operator. Several independent
//! reconcile loops write into the status of the same object, see
//! [`crate::controller::status`].

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterOperator reports the health of one platform operator
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    kind = "ClusterOperator",
    group = "config.openshift.io",
    version = "v1",
    plural = "clusteroperators",
    shortname = "co",
    status = "ClusterOperatorStatus",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.versions[?(@.name==\"operator\")].version"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}, {"name":"Degraded", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Degraded\")].status"}"#
)]
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "The resource has no spec fields but the derive needs a named struct"
)]
pub struct ClusterOperatorSpec {}

/// Status of a ClusterOperator
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    /// Conditions describing the operator state
    #[serde(default)]
    pub conditions: Vec<ClusterOperatorStatusCondition>,
    /// Versions of the operator and its operands
    #[serde(default)]
    pub versions: Vec<OperandVersion>,
    /// Objects useful when debugging the operator
    #[serde(default)]
    pub related_objects: Vec<ObjectReference>,
}

/// A single condition of a ClusterOperator
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatusCondition {
    /// Type of condition, e.g. `Available`
    pub r#type: String,
    /// Status of the condition
    pub status: ConditionStatus,
    /// Last time the status changed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// CamelCase reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Tri-state condition status
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Version of an operand
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct OperandVersion {
    pub name: String,
    pub version: String,
}

/// Reference to an object related to the operator
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ObjectReference {
    pub group: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl ClusterOperatorStatus {
    /// Look up a condition by type
    pub fn condition(&self, condition_type: &str) -> Option<&ClusterOperatorStatusCondition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}
