//! # Resource Definitions
//!
//! Typed views of the `config.openshift.io/v1` records the operator reads and
//! writes. The schemas are owned and installed by the platform; these types
//! only cover the fields the reconcile loops care about. Unknown fields are
//! dropped on read, so none of these types are ever written back wholesale
//! except through the status subresource of `ClusterOperator`.

mod cluster_operator;
mod feature_gate;
mod infrastructure;

pub use cluster_operator::{
    ClusterOperator, ClusterOperatorSpec, ClusterOperatorStatus, ClusterOperatorStatusCondition,
    ConditionStatus, ObjectReference, OperandVersion,
};
pub use feature_gate::{FeatureGate, FeatureGateSpec};
pub use infrastructure::{
    CloudConfigReference, Infrastructure, InfrastructureSpec, InfrastructureStatus, PlatformStatus,
};
