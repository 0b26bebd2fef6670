use std::sync::Arc;
use std::time::Duration;

use kube::ResourceExt;
use tracing::{debug, error, info, instrument};

use crate::api::cluster::{Cluster, ClusterStatus};
use crate::telemetry;

use super::client::{ClusterClientFactory, ClusterStore, MemberClusterClient};
use super::{conditions, enablements, health, node_summary};
use super::{StatusSyncError, StatusSyncResult};

/// How a reconciliation wants to be scheduled next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do until the object changes.
    Done,
    /// Run again right away, without reporting an error.
    Requeue,
    /// Run again after the given delay.
    RequeueAfter(Duration),
}

/// Keeps the status of member clusters in sync with what they report.
pub struct ClusterStatusController {
    store: Arc<dyn ClusterStore>,
    client_factory: Arc<dyn ClusterClientFactory>,
    /// Frequency at which the status of a cluster is recomputed.
    status_update_frequency: Duration,
}

impl ClusterStatusController {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        client_factory: Arc<dyn ClusterClientFactory>,
        status_update_frequency: Duration,
    ) -> Self {
        Self {
            store,
            client_factory,
            status_update_frequency,
        }
    }

    /// Syncs the status of the named member cluster.
    #[instrument(skip(self), fields(trace_id = display(telemetry::get_trace_id())), err)]
    pub async fn reconcile(&self, name: &str) -> StatusSyncResult<ReconcileOutcome> {
        debug!("Syncing cluster status");

        // The cluster may be gone already, nothing left to observe.
        let Some(cluster) = self
            .store
            .get_cluster(name)
            .await
            .map_err(StatusSyncError::Lookup)?
        else {
            return Ok(ReconcileOutcome::Done);
        };

        if cluster.deletion_in_progress() {
            return Ok(ReconcileOutcome::Done);
        }

        // Status is owned by this controller only once the cluster controller
        // attached its finalizer.
        if !cluster.has_controller_finalizer() {
            info!("Waiting for finalizer to be present on member cluster {name}");
            return Ok(ReconcileOutcome::Requeue);
        }

        self.sync_cluster_status(&cluster).await
    }

    async fn sync_cluster_status(&self, cluster: &Cluster) -> StatusSyncResult<ReconcileOutcome> {
        let name = cluster.name_any();
        let client = self
            .client_factory
            .new_cluster_client(cluster)
            .await
            .inspect_err(|e| error!("Failed to create a client for member cluster {name}: {e}"))?;

        let health = health::cluster_health_with_retry(client.as_ref(), &name).await;
        if !health.online {
            let mut current = ClusterStatus {
                conditions: conditions::generate_ready_condition(health),
                ..Default::default()
            };
            conditions::set_transition_time(&cluster.current_status(), &mut current);
            return self.update_status_if_needed(cluster, current).await;
        }

        let mut current = self.observe(client.as_ref(), &name).await?;
        current.conditions = conditions::generate_ready_condition(health);
        conditions::set_transition_time(&cluster.current_status(), &mut current);

        self.update_status_if_needed(cluster, current).await
    }

    /// Version, installed APIs and node summary of a reachable member cluster.
    async fn observe(
        &self,
        client: &dyn MemberClusterClient,
        name: &str,
    ) -> StatusSyncResult<ClusterStatus> {
        let kubernetes_version = client
            .server_version()
            .await
            .inspect_err(|e| error!("Failed to get server version of member cluster {name}: {e}"))
            .map_err(StatusSyncError::ServerVersion)?;

        let api_enablements = enablements::api_enablements(client)
            .await
            .inspect_err(|e| error!("Failed to get APIs installed in member cluster {name}: {e}"))
            .map_err(StatusSyncError::ApiEnablements)?;

        let node_summary = node_summary::node_summary(client)
            .await
            .inspect_err(|e| error!("Failed to get node summary of member cluster {name}: {e}"))?;

        Ok(ClusterStatus {
            kubernetes_version,
            api_enablements,
            node_summary,
            ..Default::default()
        })
    }

    /// Writes the status only when it differs from the stored one.
    async fn update_status_if_needed(
        &self,
        cluster: &Cluster,
        current: ClusterStatus,
    ) -> StatusSyncResult<ReconcileOutcome> {
        if !cluster.current_status().semantic_eq(&current) {
            info!("Updating status of member cluster {}", cluster.name_any());
            self.store
                .update_cluster_status(cluster, &current)
                .await
                .inspect_err(|e| {
                    error!(
                        "Failed to update status of member cluster {}: {e}",
                        cluster.name_any()
                    )
                })
                .map_err(StatusSyncError::StatusUpdate)?;
        }

        Ok(ReconcileOutcome::RequeueAfter(self.status_update_frequency))
    }
}
