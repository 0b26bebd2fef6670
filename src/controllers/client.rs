use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use k8s_openapi::api::core::v1::{Node, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::api::{ListParams, PostParams};
use kube::client::Body;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::api::cluster::{Cluster, ClusterStatus};

use super::health::RETRY_TIMEOUT;
use super::{ClusterClientError, ClusterClientResult, MemberClusterResult};

/// Key of the kubeconfig inside the cluster secret.
pub static KUBECONFIG_SECRET_KEY: &str = "value";

/// Access to Cluster objects in the control plane store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a Cluster by name, `None` when it no longer exists.
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>, kube::Error>;

    /// Replace the status of the given Cluster.
    ///
    /// The write is conditional on the resource version carried by `cluster`.
    async fn update_cluster_status(
        &self,
        cluster: &Cluster,
        status: &ClusterStatus,
    ) -> Result<(), kube::Error>;
}

/// Builds clients targeting a specific member cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn new_cluster_client(
        &self,
        cluster: &Cluster,
    ) -> ClusterClientResult<Arc<dyn MemberClusterClient>>;
}

/// Calls issued against a member cluster API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MemberClusterClient: Send + Sync {
    /// GET an absolute path, returning the response status.
    ///
    /// Errors are reserved for requests that never got a response.
    async fn probe_endpoint(&self, path: &str) -> MemberClusterResult<StatusCode>;

    async fn server_version(&self) -> MemberClusterResult<String>;

    /// Resource lists for every served group version, core group included.
    async fn list_api_resources(&self) -> MemberClusterResult<Vec<APIResourceList>>;

    async fn list_nodes(&self) -> MemberClusterResult<Vec<Node>>;

    async fn list_all_pods(&self) -> MemberClusterResult<Vec<Pod>>;
}

pub struct KubeClusterStore {
    client: Client,
}

impl KubeClusterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>, kube::Error> {
        Api::<Cluster>::all(self.client.clone()).get_opt(name).await
    }

    async fn update_cluster_status(
        &self,
        cluster: &Cluster,
        status: &ClusterStatus,
    ) -> Result<(), kube::Error> {
        let api = Api::<Cluster>::all(self.client.clone());

        let mut updated = cluster.clone();
        updated.metadata.managed_fields = None;
        updated.status = Some(status.clone());
        let data = serde_json::to_vec(&updated).map_err(kube::Error::SerdeError)?;

        api.replace_status(&cluster.name_any(), &PostParams::default(), data)
            .await?;
        Ok(())
    }
}

/// Builds member cluster clients from the kubeconfig secret referenced by the Cluster.
pub struct KubeClusterClientFactory {
    client: Client,
}

impl KubeClusterClientFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn member_config(&self, cluster: &Cluster) -> ClusterClientResult<Config> {
        let secret_ref = cluster.kubeconfig_secret();
        let secret = Api::<Secret>::namespaced(self.client.clone(), &secret_ref.namespace)
            .get(&secret_ref.name)
            .await
            .map_err(ClusterClientError::SecretLookup)?;

        let kubeconfig = secret
            .data
            .as_ref()
            .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
            .ok_or_else(|| ClusterClientError::MissingKubeconfig(secret_ref.name.clone()))?;
        let kubeconfig = Kubeconfig::from_yaml(&String::from_utf8_lossy(&kubeconfig.0))?;

        let mut config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        if let Some(endpoint) = cluster.spec.api_endpoint.as_deref() {
            config.cluster_url = endpoint.parse()?;
        }
        if let Some(insecure) = cluster.spec.insecure_skip_tls_verification {
            config.accept_invalid_certs = insecure;
        }
        // A blackholed member must not hold the worker past the health poll.
        config.connect_timeout = Some(RETRY_TIMEOUT);

        Ok(config)
    }
}

#[async_trait]
impl ClusterClientFactory for KubeClusterClientFactory {
    async fn new_cluster_client(
        &self,
        cluster: &Cluster,
    ) -> ClusterClientResult<Arc<dyn MemberClusterClient>> {
        let config = self.member_config(cluster).await?;
        debug!(url = %config.cluster_url, "Built member cluster config");

        Ok(Arc::new(KubeMemberClusterClient {
            client: Client::try_from(config)?,
        }))
    }
}

pub struct KubeMemberClusterClient {
    client: Client,
}

#[async_trait]
impl MemberClusterClient for KubeMemberClusterClient {
    async fn probe_endpoint(&self, path: &str) -> MemberClusterResult<StatusCode> {
        let request = http::Request::get(path).body(Body::empty())?;
        let response = self.client.send(request).await?;
        Ok(response.status())
    }

    async fn server_version(&self) -> MemberClusterResult<String> {
        Ok(self.client.apiserver_version().await?.git_version)
    }

    async fn list_api_resources(&self) -> MemberClusterResult<Vec<APIResourceList>> {
        let mut lists = Vec::new();

        for version in self.client.list_core_api_versions().await?.versions {
            lists.push(self.client.list_core_api_resources(&version).await?);
        }

        for group in self.client.list_api_groups().await?.groups {
            for version in group.versions {
                lists.push(
                    self.client
                        .list_api_group_resources(&version.group_version)
                        .await?,
                );
            }
        }

        Ok(lists)
    }

    async fn list_nodes(&self) -> MemberClusterResult<Vec<Node>> {
        Ok(Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await?
            .items)
    }

    async fn list_all_pods(&self) -> MemberClusterResult<Vec<Pod>> {
        Ok(Api::<Pod>::all(self.client.clone())
            .list(&ListParams::default())
            .await?
            .items)
    }
}
