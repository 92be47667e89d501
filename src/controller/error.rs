//! # Reconciler Errors

use crate::controller::kubeconfig::GenerateError;
use crate::controller::status::StatusError;
use crate::store::StoreError;
use thiserror::Error;

/// Error returned by a reconcile run
///
/// The [`ReconcilerError::reason`] ends up as the reason of the Degraded
/// condition and as a metrics label.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error("failed to generate kubeconfig: {0}")]
    Validation(#[from] GenerateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to serialize kubeconfig: {0}")]
    Serialization(#[from] serde_yaml::Error),
    #[error("failed to report ClusterOperator status: {0}")]
    Status(#[from] StatusError),
}

impl ReconcilerError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        ReconcilerError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    /// CamelCase reason for conditions and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::NotFound { .. } | ReconcilerError::Store(StoreError::NotFound { .. }) => {
                "NotFound"
            }
            ReconcilerError::Validation(_) => "InvalidCredentials",
            ReconcilerError::Store(StoreError::Conflict { .. }) => "Conflict",
            ReconcilerError::Store(_) => "StoreError",
            ReconcilerError::Serialization(_) => "SerializationFailed",
            ReconcilerError::Status(_) => "StatusUpdateFailed",
        }
    }

    /// Whether a later attempt may succeed without outside intervention
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcilerError::Store(e) => e.is_transient(),
            ReconcilerError::Status(StatusError::Store(e)) => e.is_transient(),
            ReconcilerError::Status(StatusError::RetriesExhausted { .. }) => true,
            ReconcilerError::NotFound { .. }
            | ReconcilerError::Validation(_)
            | ReconcilerError::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons() {
        assert_eq!(
            ReconcilerError::not_found("Infrastructure", "cluster").reason(),
            "NotFound"
        );
        assert_eq!(
            ReconcilerError::from(GenerateError::EmptyField("token")).reason(),
            "InvalidCredentials"
        );
        assert_eq!(
            ReconcilerError::from(StoreError::Unavailable("down".to_string())).reason(),
            "StoreError"
        );
        assert_eq!(
            ReconcilerError::from(StatusError::RetriesExhausted { attempts: 5 }).reason(),
            "StatusUpdateFailed"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(!ReconcilerError::not_found("Secret", "x").is_transient());
        assert!(ReconcilerError::from(StoreError::Unavailable("down".to_string())).is_transient());
        assert!(ReconcilerError::from(StatusError::RetriesExhausted { attempts: 5 }).is_transient());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            ReconcilerError::not_found("Infrastructure", "cluster").to_string(),
            "Infrastructure cluster not found"
        );
    }
}
