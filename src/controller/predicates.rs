//! # Event Filter
//!
//! Decides which change notifications wake which reconcile loop. Every
//! record the operator watches is a singleton, so a predicate is just a kind
//! plus a fixed object name.

use crate::constants::{CLUSTER_OPERATOR_NAME, FEATURE_GATE_NAME, INFRASTRUCTURE_RESOURCE_NAME};
use crate::crd::{ClusterOperator, FeatureGate, Infrastructure};
use kube::ResourceExt;
use std::fmt;

/// Kinds of records the filter understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedKind {
    Infrastructure,
    ClusterOperator,
    FeatureGate,
}

impl ObservedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservedKind::Infrastructure => "Infrastructure",
            ObservedKind::ClusterOperator => "ClusterOperator",
            ObservedKind::FeatureGate => "FeatureGate",
        }
    }
}

impl fmt::Display for ObservedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A watched object, tagged by kind
#[derive(Debug, Clone, Copy)]
pub enum ObservedObject<'a> {
    Infrastructure(&'a Infrastructure),
    ClusterOperator(&'a ClusterOperator),
    FeatureGate(&'a FeatureGate),
    /// Anything the operator has no typed view of
    Unrecognized { kind: &'a str, name: &'a str },
}

impl ObservedObject<'_> {
    /// Kind of the object, `None` when unrecognized
    pub fn kind(&self) -> Option<ObservedKind> {
        match self {
            ObservedObject::Infrastructure(_) => Some(ObservedKind::Infrastructure),
            ObservedObject::ClusterOperator(_) => Some(ObservedKind::ClusterOperator),
            ObservedObject::FeatureGate(_) => Some(ObservedKind::FeatureGate),
            ObservedObject::Unrecognized { .. } => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            ObservedObject::Infrastructure(obj) => obj.name_any(),
            ObservedObject::ClusterOperator(obj) => obj.name_any(),
            ObservedObject::FeatureGate(obj) => obj.name_any(),
            ObservedObject::Unrecognized { name, .. } => (*name).to_string(),
        }
    }
}

/// Typed objects that can be handed to the filter
pub trait Observe {
    fn observed(&self) -> ObservedObject<'_>;
}

impl Observe for Infrastructure {
    fn observed(&self) -> ObservedObject<'_> {
        ObservedObject::Infrastructure(self)
    }
}

impl Observe for ClusterOperator {
    fn observed(&self) -> ObservedObject<'_> {
        ObservedObject::ClusterOperator(self)
    }
}

impl Observe for FeatureGate {
    fn observed(&self) -> ObservedObject<'_> {
        ObservedObject::FeatureGate(self)
    }
}

/// A change notification
#[derive(Debug, Clone, Copy)]
pub enum ChangeEvent<'a> {
    Create(ObservedObject<'a>),
    Update {
        old: ObservedObject<'a>,
        new: ObservedObject<'a>,
    },
    Delete(ObservedObject<'a>),
    /// Resync or externally injected notification
    Generic(ObservedObject<'a>),
}

impl<'a> ChangeEvent<'a> {
    /// The object a predicate looks at: the new one for updates
    pub fn object(&self) -> &ObservedObject<'a> {
        match self {
            ChangeEvent::Create(obj) | ChangeEvent::Delete(obj) | ChangeEvent::Generic(obj) => obj,
            ChangeEvent::Update { new, .. } => new,
        }
    }

    /// Short label for logs
    pub fn action(&self) -> &'static str {
        match self {
            ChangeEvent::Create(_) => "create",
            ChangeEvent::Update { .. } => "update",
            ChangeEvent::Delete(_) => "delete",
            ChangeEvent::Generic(_) => "generic",
        }
    }
}

/// Admits events about one named object of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    kind: ObservedKind,
    name: String,
}

impl Predicate {
    pub fn new(kind: ObservedKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ObservedKind {
        self.kind
    }

    pub fn admits(&self, event: &ChangeEvent<'_>) -> bool {
        let obj = event.object();
        obj.kind() == Some(self.kind) && obj.name() == self.name
    }
}

/// Events about `Infrastructure/cluster`
pub fn infrastructure_predicate() -> Predicate {
    Predicate::new(ObservedKind::Infrastructure, INFRASTRUCTURE_RESOURCE_NAME)
}

/// Events about `ClusterOperator/cluster-api`
pub fn cluster_operator_predicate() -> Predicate {
    Predicate::new(ObservedKind::ClusterOperator, CLUSTER_OPERATOR_NAME)
}

/// Events about `FeatureGate/cluster`
pub fn feature_gate_predicate() -> Predicate {
    Predicate::new(ObservedKind::FeatureGate, FEATURE_GATE_NAME)
}
