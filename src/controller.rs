use crate::api::cluster::Cluster;
use crate::config::ControllerConfig;
use crate::controllers::client::{KubeClusterClientFactory, KubeClusterStore};
use crate::controllers::cluster_status::{ClusterStatusController, ReconcileOutcome};
use crate::{predicates, telemetry, Error, Metrics, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client,
    runtime::controller::{Action, Controller},
    runtime::{reflector, watcher, WatchStreamExt},
};
use opentelemetry::trace::TraceId;
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

// Context for the reconciler
pub struct Context {
    /// Cluster status sync logic
    pub status: ClusterStatusController,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prom metrics
    pub metrics: Metrics,
    /// Delay applied to requeue requests and failed reconciliations
    pub requeue_delay: Duration,
}

#[instrument(skip(ctx, cluster), fields(name = cluster.name_any(), trace_id))]
async fn reconcile(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action> {
    let trace_id = telemetry::get_trace_id();
    if trace_id != TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _timer = ctx.metrics.count_and_measure();
    ctx.diagnostics.write().await.last_event = Utc::now();

    let outcome = ctx.status.reconcile(&cluster.name_any()).await?;
    ctx.diagnostics.write().await.reconciled += 1;

    Ok(to_action(outcome, ctx.requeue_delay))
}

/// Map a sync outcome onto the controller scheduling
pub fn to_action(outcome: ReconcileOutcome, requeue_delay: Duration) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::Requeue => Action::requeue(requeue_delay),
        ReconcileOutcome::RequeueAfter(after) => Action::requeue(after),
    }
}

fn error_policy(cluster: Arc<Cluster>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&cluster, error);
    Action::requeue(ctx.requeue_delay)
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    /// Successful reconciliations since start
    pub reconciled: u64,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reconciled: 0,
        }
    }
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client, config: &ControllerConfig) -> Result<Arc<Context>> {
        let status = ClusterStatusController::new(
            Arc::new(KubeClusterStore::new(client.clone())),
            Arc::new(KubeClusterClientFactory::new(client)),
            config.status_update_frequency(),
        );

        Ok(Arc::new(Context {
            status,
            metrics: Metrics::default().register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
            requeue_delay: config.requeue_delay(),
        }))
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, config: ControllerConfig) -> Result<()> {
    let client = Client::try_default().await?;
    let clusters = Api::<Cluster>::all(client.clone());
    if let Err(e) = clusters.list(&ListParams::default().limit(1)).await {
        error!("Clusters are not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: controller --crd | kubectl apply -f -");
        std::process::exit(1);
    }

    // Status writes leave the generation alone, so they do not trigger a new sync.
    let (reader, writer) = reflector::store();
    let clusters = watcher(clusters, watcher::Config::default().any_semantic())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .predicate_filter(predicates::generation_with_deletion);

    Controller::for_stream(clusters, reader)
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client, &config)?)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}
