//! # Controller Metrics
//!
//! Metrics for the reconcile loops: reconciles, errors, requeues, admitted
//! triggers, kubeconfig secret writes and status write conflicts.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};
use std::sync::LazyLock;

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "capi_operator_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "capi_operator_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["controller", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "capi_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "capi_operator_requeues_total",
            "Total number of reconciliation requeues",
        ),
        &["controller", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static TRIGGERS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "capi_operator_watch_events_total",
            "Total number of watch events, by kind and filter decision",
        ),
        &["kind", "admitted"],
    )
    .expect("Failed to create TRIGGERS_TOTAL metric - this should never happen")
});

static KUBECONFIG_SECRET_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "capi_operator_kubeconfig_secret_upserts_total",
            "Total number of kubeconfig secret upserts, by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create KUBECONFIG_SECRET_WRITES_TOTAL metric - this should never happen")
});

static STATUS_WRITE_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "capi_operator_status_write_conflicts_total",
        "Total number of ClusterOperator status writes rejected by a concurrent update",
    )
    .expect("Failed to create STATUS_WRITE_CONFLICTS_TOTAL metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRIGGERS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KUBECONFIG_SECRET_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_WRITE_CONFLICTS_TOTAL.clone()))?;
    Ok(())
}

// Public functions for controller metrics

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller, reason])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn increment_requeues_total(controller: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[controller, reason]).inc();
}

pub fn increment_watch_events(kind: &str, admitted: bool) {
    let admitted = if admitted { "true" } else { "false" };
    TRIGGERS_TOTAL.with_label_values(&[kind, admitted]).inc();
}

pub fn increment_kubeconfig_secret_upserts(outcome: &str) {
    KUBECONFIG_SECRET_WRITES_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn increment_status_write_conflicts() {
    STATUS_WRITE_CONFLICTS_TOTAL.inc();
}
