//! # Watch Loop
//!
//! Runs each reconcile loop on a `kube_runtime::Controller`. The primary
//! watch is the loop's singleton record, narrowed by a field selector; other
//! records that should wake the loop are added as secondary watches whose
//! mapper applies the loop's predicates.
//!
//! The controller coalesces triggers that arrive while a reconcile runs,
//! never runs two reconciles of one loop at once, and requeues failures
//! through [`handle_reconciliation_error`].

use super::context::LoopContext;
use super::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use super::initialization::InitializationResult;
use crate::constants::{CLUSTER_OPERATOR_NAME, FEATURE_GATE_NAME, INFRASTRUCTURE_RESOURCE_NAME};
use crate::controller::predicates::{
    cluster_operator_predicate, feature_gate_predicate, infrastructure_predicate, ChangeEvent,
    Observe, ObservedKind, Predicate,
};
use crate::controller::{
    ClusterOperatorReconciler, KubeconfigReconciler, Reconcile, ReconcilerError, StatusWriter,
};
use crate::crd::{ClusterOperator, FeatureGate, Infrastructure};
use crate::observability;
use crate::store::KubeStore;
use anyhow::Result;
use futures::StreamExt;
use kube::{Api, Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Watch configuration selecting a single object by name
pub fn singleton_watch(name: &str) -> watcher::Config {
    watcher::Config::default().fields(&format!("metadata.name={name}"))
}

/// Mapper for a secondary watch: wakes the loop whose primary object is
/// `target` when `predicate` admits the changed object
pub fn route_to<Other, K>(
    predicate: Predicate,
    target: &'static str,
) -> impl Fn(Other) -> Option<ObjectRef<K>> + Send + Sync + 'static
where
    Other: Observe + 'static,
    K: Resource<DynamicType = ()> + 'static,
{
    move |obj: Other| {
        let event = ChangeEvent::Generic(obj.observed());
        let admitted = predicate.admits(&event);
        observability::metrics::increment_watch_events(predicate.kind().as_str(), admitted);
        if admitted {
            debug!(
                kind = %predicate.kind(),
                name = %event.object().name(),
                action = event.action(),
                "change admitted, enqueueing reconcile"
            );
        }
        admitted.then(|| ObjectRef::new(target))
    }
}

/// Run the loop's reconciler once with its span and metrics
pub async fn run_reconcile(ctx: &LoopContext, trigger: &'static str) -> Result<(), ReconcilerError> {
    let controller = ctx.name();
    let span = tracing::info_span!(
        "controller.reconcile",
        controller = controller,
        trigger = trigger
    );

    async {
        observability::metrics::increment_reconciliations(controller);
        let start = Instant::now();
        let result = ctx.reconciler().reconcile().await;
        observability::metrics::observe_reconciliation_duration(
            controller,
            start.elapsed().as_secs_f64(),
        );

        match &result {
            Ok(()) => debug!("reconcile succeeded"),
            Err(e) => {
                observability::metrics::increment_reconciliation_errors(controller, e.reason());
            }
        }
        result
    }
    .instrument(span)
    .await
}

/// Reconcile entry point handed to the controller
///
/// The object only identifies the loop. The reconciler re-reads everything
/// it needs from the store.
pub async fn reconcile<K>(obj: Arc<K>, ctx: Arc<LoopContext>) -> Result<Action, ReconcilerError>
where
    K: ResourceExt + Send + Sync,
{
    debug!(controller = ctx.name(), object = %obj.name_any(), "reconcile requested");
    run_reconcile(&ctx, "watch").await?;
    ctx.reset_backoff();

    let action = ctx.resync_action();
    if action != Action::await_change() {
        observability::metrics::increment_requeues_total(ctx.name(), "resync");
    }
    Ok(action)
}

/// Handle one item of a controller's output stream
async fn handle_result<K>(
    kind: ObservedKind,
    result: Result<(ObjectRef<K>, Action), controller::Error<ReconcilerError, watcher::Error>>,
    ctx: &LoopContext,
) where
    K: Resource<DynamicType = ()>,
{
    match result {
        Ok((obj_ref, action)) => {
            debug!(controller = ctx.name(), object = %obj_ref, ?action, "reconcile completed");
        }
        Err(controller::Error::ObjectNotFound(obj_ref)) => {
            // The primary record is gone; the loop still has to report that
            info!(
                controller = ctx.name(),
                object = %obj_ref,
                "primary object is absent, reconciling without it"
            );
            if let Err(e) = run_reconcile(ctx, "primary-absent").await {
                warn!(controller = ctx.name(), "Reconcile without primary object failed: {}", e);
            }
        }
        Err(controller::Error::ReconcilerFailed(e, obj_ref)) => {
            debug!(controller = ctx.name(), object = %obj_ref, "reconcile failed: {}", e);
        }
        Err(controller::Error::QueueError(e)) => {
            handle_watch_stream_error(kind.as_str(), &e.to_string());
        }
        Err(e) => {
            error!(controller = ctx.name(), "Controller error: {}", e);
        }
    }
}

/// Drive a configured controller until shutdown
pub async fn drive<K>(controller: Controller<K>, kind: ObservedKind, ctx: Arc<LoopContext>)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    info!(controller = ctx.name(), primary = %kind, "Starting reconcile loop");
    controller
        .shutdown_on_signal()
        .run(reconcile::<K>, handle_reconciliation_error::<K>, Arc::clone(&ctx))
        .for_each(|result| {
            let ctx = Arc::clone(&ctx);
            async move { handle_result(kind, result, &ctx).await }
        })
        .await;
    info!(controller = ctx.name(), "Reconcile loop stopped");
}

/// Kubeconfig loop: primary `Infrastructure/cluster`
fn kubeconfig_controller(client: &kube::Client) -> Controller<Infrastructure> {
    Controller::new(
        Api::<Infrastructure>::all(client.clone()),
        singleton_watch(INFRASTRUCTURE_RESOURCE_NAME),
    )
    // Deletes of the primary do not reach the reconciler otherwise
    .watches(
        Api::<Infrastructure>::all(client.clone()),
        singleton_watch(INFRASTRUCTURE_RESOURCE_NAME),
        route_to::<Infrastructure, Infrastructure>(
            infrastructure_predicate(),
            INFRASTRUCTURE_RESOURCE_NAME,
        ),
    )
}

/// ClusterOperator loop: primary `FeatureGate/cluster`, also woken by
/// changes to `ClusterOperator/cluster-api`
fn cluster_operator_controller(client: &kube::Client) -> Controller<FeatureGate> {
    Controller::new(
        Api::<FeatureGate>::all(client.clone()),
        singleton_watch(FEATURE_GATE_NAME),
    )
    .watches(
        Api::<FeatureGate>::all(client.clone()),
        singleton_watch(FEATURE_GATE_NAME),
        route_to::<FeatureGate, FeatureGate>(feature_gate_predicate(), FEATURE_GATE_NAME),
    )
    .watches(
        Api::<ClusterOperator>::all(client.clone()),
        singleton_watch(CLUSTER_OPERATOR_NAME),
        route_to::<ClusterOperator, FeatureGate>(cluster_operator_predicate(), FEATURE_GATE_NAME),
    )
}

/// Start both reconcile loops and run until shutdown
pub async fn run_watch_loop(init: InitializationResult) -> Result<()> {
    let config = Arc::clone(&init.controller_config);
    let store = Arc::new(KubeStore::new(init.client.clone()));
    let status = Arc::new(StatusWriter::new(Arc::clone(&store), &config));

    let kubeconfig: Arc<dyn Reconcile> = Arc::new(KubeconfigReconciler::new(
        Arc::clone(&store),
        Arc::clone(&status),
        Arc::clone(&config),
        init.api_server_endpoint.clone(),
    ));
    let cluster_operator: Arc<dyn Reconcile> = Arc::new(ClusterOperatorReconciler::new(
        Arc::clone(&store),
        Arc::clone(&status),
        Arc::clone(&config),
    ));
    let kubeconfig_ctx = Arc::new(LoopContext::new(kubeconfig, &config));
    let cluster_operator_ctx = Arc::new(LoopContext::new(cluster_operator, &config));

    // The controllers only reconcile once their primary object shows up, so
    // report on a missing one right away
    for ctx in [&kubeconfig_ctx, &cluster_operator_ctx] {
        if let Err(e) = run_reconcile(ctx, "startup").await {
            warn!(controller = ctx.name(), "Startup reconcile failed: {}", e);
        }
    }

    info!("Controller running, press Ctrl+C to stop");
    tokio::select! {
        () = drive(
            kubeconfig_controller(&init.client),
            ObservedKind::Infrastructure,
            Arc::clone(&kubeconfig_ctx),
        ) => {
            info!("Kubeconfig loop completed");
        }
        () = drive(
            cluster_operator_controller(&init.client),
            ObservedKind::FeatureGate,
            Arc::clone(&cluster_operator_ctx),
        ) => {
            info!("ClusterOperator loop completed");
        }
    }

    init.server_state
        .is_ready
        .store(false, std::sync::atomic::Ordering::Relaxed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::crd::{ClusterOperatorSpec, FeatureGateSpec, InfrastructureSpec};
    use crate::store::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FlakyReconciler {
        runs: AtomicU32,
        failures: AtomicU32,
    }

    #[async_trait]
    impl Reconcile for FlakyReconciler {
        fn name(&self) -> &'static str {
            "Flaky"
        }

        async fn reconcile(&self) -> Result<(), ReconcilerError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("down".to_string()).into());
            }
            Ok(())
        }
    }

    fn context(reconciler: &Arc<FlakyReconciler>) -> Arc<LoopContext> {
        let config = ControllerConfig {
            resync_interval_secs: 600,
            backoff_min_secs: 1,
            backoff_max_secs: 10,
            ..ControllerConfig::default()
        };
        let reconciler: Arc<dyn Reconcile> = Arc::<FlakyReconciler>::clone(reconciler);
        Arc::new(LoopContext::new(reconciler, &config))
    }

    fn infra(name: &str) -> Infrastructure {
        Infrastructure::new(name, InfrastructureSpec::default())
    }

    #[test]
    fn test_singleton_watch_selects_by_name() {
        let config = singleton_watch("cluster-api");
        assert_eq!(config.field_selector.as_deref(), Some("metadata.name=cluster-api"));
    }

    #[test]
    fn test_route_to_admits_only_the_singleton() {
        let mapper = route_to::<Infrastructure, Infrastructure>(infrastructure_predicate(), "cluster");
        assert_eq!(mapper(infra("cluster")), Some(ObjectRef::new("cluster")));
        assert_eq!(mapper(infra("other")), None);
    }

    #[test]
    fn test_route_to_maps_cluster_operator_onto_feature_gate() {
        let mapper =
            route_to::<ClusterOperator, FeatureGate>(cluster_operator_predicate(), FEATURE_GATE_NAME);
        let ours = ClusterOperator::new(CLUSTER_OPERATOR_NAME, ClusterOperatorSpec {});
        let theirs = ClusterOperator::new("machine-api", ClusterOperatorSpec {});
        assert_eq!(mapper(ours), Some(ObjectRef::<FeatureGate>::new("cluster")));
        assert_eq!(mapper(theirs), None);
    }

    #[test]
    fn test_route_to_rejects_wrong_kind_with_same_name() {
        // FeatureGate "cluster" must not wake the Infrastructure loop
        let mapper = route_to::<FeatureGate, Infrastructure>(infrastructure_predicate(), "cluster");
        assert_eq!(mapper(FeatureGate::new("cluster", FeatureGateSpec::default())), None);
    }

    #[tokio::test]
    async fn test_reconcile_requeues_for_resync() {
        let reconciler = Arc::new(FlakyReconciler::default());
        let ctx = context(&reconciler);

        let action = reconcile(Arc::new(infra("cluster")), Arc::clone(&ctx)).await.unwrap();
        assert_eq!(action, Action::requeue(Duration::from_secs(600)));
        assert_eq!(reconciler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_resets_backoff() {
        let reconciler = Arc::new(FlakyReconciler::default());
        reconciler.failures.store(3, Ordering::SeqCst);
        let ctx = context(&reconciler);
        let obj = Arc::new(infra("cluster"));

        let mut delays = Vec::new();
        for _ in 0..3 {
            let err = reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap_err();
            delays.push(handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&ctx)));
        }
        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(1)),
                Action::requeue(Duration::from_secs(1)),
                Action::requeue(Duration::from_secs(2)),
            ]
        );

        reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap();
        assert_eq!(ctx.next_backoff(), Duration::from_secs(1));
        assert_eq!(reconciler.runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_absent_primary_still_reconciles() {
        let reconciler = Arc::new(FlakyReconciler::default());
        let ctx = context(&reconciler);

        let missing: ObjectRef<Infrastructure> = ObjectRef::new("cluster");
        handle_result::<Infrastructure>(
            ObservedKind::Infrastructure,
            Err(controller::Error::ObjectNotFound(missing.erase())),
            &ctx,
        )
        .await;
        assert_eq!(reconciler.runs.load(Ordering::SeqCst), 1);

        handle_result::<Infrastructure>(
            ObservedKind::Infrastructure,
            Ok((ObjectRef::new("cluster"), Action::await_change())),
            &ctx,
        )
        .await;
        assert_eq!(reconciler.runs.load(Ordering::SeqCst), 1);
    }
}
