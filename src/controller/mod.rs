//! # Controller
//!
//! The reconcile loops and the pieces they are built from.
//!
//! - `predicates` - Which change notifications wake which loop
//! - `kubeconfig` - Kubeconfig derivation and the kubeconfig Secret loop
//! - `cluster_operator` - Feature set driven ClusterOperator loop
//! - `upsert` - Idempotent create-or-update of derived objects
//! - `status` - Shared ClusterOperator status writer
//! - `backoff` - Fibonacci retry delays
//! - `server` - HTTP server for metrics and probes

pub mod backoff;
pub mod cluster_operator;
pub mod error;
pub mod kubeconfig;
pub mod predicates;
pub mod server;
pub mod status;
pub mod upsert;

pub use cluster_operator::ClusterOperatorReconciler;
pub use error::ReconcilerError;
pub use kubeconfig::KubeconfigReconciler;
pub use status::{Outcome, StatusError, StatusWriter};

use async_trait::async_trait;

/// A reconcile loop
///
/// `reconcile` re-reads everything it needs from the store; triggers carry
/// no payload. It reports its own outcome on the ClusterOperator before
/// returning.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Name used in condition types, logs and metrics
    fn name(&self) -> &'static str;

    async fn reconcile(&self) -> Result<(), ReconcilerError>;
}
