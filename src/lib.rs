//! # Cluster CAPI Operator
//!
//! A Kubernetes operator that prepares a cluster for Cluster API.
//!
//! ## Overview
//!
//! Two independent reconcile loops run side by side:
//!
//! 1. **Kubeconfig** - Watches the `Infrastructure` record and, on supported
//!    platforms, maintains the `<cluster>-kubeconfig` Secret Cluster API uses
//!    to reach the management cluster
//! 2. **ClusterOperator** - Watches the `FeatureGate` and the operator's own
//!    `ClusterOperator`, reporting whether Cluster API is enabled
//!
//! Both loops report their outcome on the shared `cluster-api`
//! `ClusterOperator` through an optimistic concurrency status writer.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod store;
