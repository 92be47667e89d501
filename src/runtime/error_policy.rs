//! # Error Policy
//!
//! Backoff for failed reconciles and classification of watch stream errors.

use super::context::LoopContext;
use crate::controller::ReconcilerError;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Log a failed reconcile and requeue it after the loop's Fibonacci backoff
///
/// The backoff belongs to the failing loop, so one loop failing never slows
/// down another. It is reset by the next successful reconcile.
pub fn handle_reconciliation_error<K: ResourceExt>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<LoopContext>,
) -> Action {
    let controller = ctx.name();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        controller = controller,
        resource.name = %obj.name_any(),
        reason = error.reason(),
        error = %error
    );
    let _error_guard = error_span.enter();

    if error.is_transient() {
        warn!("Reconciliation of {} failed: {}", controller, error);
    } else {
        error!("Reconciliation of {} failed: {}", controller, error);
    }

    let delay = ctx.next_backoff();
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying {} with Fibonacci backoff in {}s, at {}",
        controller,
        delay.as_secs(),
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total(controller, "error-backoff");
    Action::requeue(delay)
}

/// Broad classes of watch failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old, the watcher relists
    Expired,
    /// API server storage reinitializing or throttling
    TooManyRequests,
    /// The watched kind is not served
    NotFound,
    Other,
}

/// Classify a watch error from its rendered message
pub fn classify_watch_error(message: &str) -> WatchErrorKind {
    if message.contains("401") || message.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if message.contains("410")
        || message.contains("too old resource version")
        || message.contains("Expired")
        || message.contains("Gone")
    {
        WatchErrorKind::Expired
    } else if message.contains("429")
        || message.contains("storage is (re)initializing")
        || message.contains("TooManyRequests")
    {
        WatchErrorKind::TooManyRequests
    } else if message.contains("404") || message.contains("NotFound") {
        WatchErrorKind::NotFound
    } else {
        WatchErrorKind::Other
    }
}

/// Log a watch stream error. The watcher backs off and restarts by itself.
pub fn handle_watch_stream_error(kind: &str, message: &str) -> WatchErrorKind {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        kind = kind,
        error = %message
    );
    let _error_guard = error_span.enter();

    let class = classify_watch_error(message);
    match class {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch on {} failed with 401 Unauthorized, RBAC may have been revoked or the token expired",
                kind
            );
        }
        WatchErrorKind::Expired => {
            warn!("Watch on {} expired (410), relisting", kind);
        }
        WatchErrorKind::TooManyRequests => {
            warn!("API server throttling watch on {} (429), backing off", kind);
        }
        WatchErrorKind::NotFound => {
            error!("{} is not served by the API server, is the resource installed?", kind);
        }
        WatchErrorKind::Other => {
            error!("Watch on {} failed: {}", kind, message);
        }
    }
    class
}
