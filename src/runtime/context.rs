//! # Loop Context
//!
//! State a reconcile loop carries between runs: the reconciler, its retry
//! backoff and the resync period. Shared with `kube_runtime::Controller` as
//! the reconcile context.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::Reconcile;
use kube_runtime::controller::Action;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Context of one reconcile loop
pub struct LoopContext {
    reconciler: Arc<dyn Reconcile>,
    backoff: Mutex<FibonacciBackoff>,
    resync_interval: Option<Duration>,
}

impl fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopContext")
            .field("controller", &self.reconciler.name())
            .field("resync_interval", &self.resync_interval)
            .finish_non_exhaustive()
    }
}

impl LoopContext {
    pub fn new(reconciler: Arc<dyn Reconcile>, config: &ControllerConfig) -> Self {
        Self {
            reconciler,
            backoff: Mutex::new(FibonacciBackoff::new(
                config.backoff_min_secs,
                config.backoff_max_secs,
            )),
            resync_interval: config.resync_interval(),
        }
    }

    /// Name of the loop, for logs and metrics
    pub fn name(&self) -> &'static str {
        self.reconciler.name()
    }

    pub fn reconciler(&self) -> &dyn Reconcile {
        self.reconciler.as_ref()
    }

    fn lock_backoff(&self) -> MutexGuard<'_, FibonacciBackoff> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay before retrying a failed reconcile
    pub fn next_backoff(&self) -> Duration {
        self.lock_backoff().next_backoff()
    }

    pub fn reset_backoff(&self) {
        self.lock_backoff().reset();
    }

    /// What to do after a successful reconcile
    pub fn resync_action(&self) -> Action {
        match self.resync_interval {
            Some(interval) => Action::requeue(interval),
            None => Action::await_change(),
        }
    }
}
