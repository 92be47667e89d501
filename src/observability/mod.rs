//! # Observability
//!
//! Prometheus metrics for the reconcile loops. Logging goes through `tracing`
//! and is configured by the host process, see [`crate::runtime::initialization`].

pub mod metrics;
