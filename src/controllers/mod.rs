use thiserror::Error;

pub type StatusSyncResult<T> = std::result::Result<T, StatusSyncError>;

/// Failures to observe a member cluster. A member cluster that is observed
/// to be unhealthy is not an error, it is reported through its conditions.
#[derive(Error, Debug)]
pub enum StatusSyncError {
    #[error("Cluster lookup error: {0}")]
    Lookup(#[source] kube::Error),

    #[error("Cluster client error: {0}")]
    ClusterClient(#[from] ClusterClientError),

    #[error("Server version error: {0}")]
    ServerVersion(#[source] MemberClusterError),

    #[error("API enablements error: {0}")]
    ApiEnablements(#[source] MemberClusterError),

    #[error("Node summary error: {0}")]
    NodeSummary(#[from] NodeSummaryError),

    #[error("Status update error: {0}")]
    StatusUpdate(#[source] kube::Error),
}

pub type ClusterClientResult<T> = std::result::Result<T, ClusterClientError>;

#[derive(Error, Debug)]
pub enum ClusterClientError {
    #[error("Kubeconfig secret lookup error: {0}")]
    SecretLookup(#[source] kube::Error),

    #[error("Kubeconfig secret `{0}` has no `value` key")]
    MissingKubeconfig(String),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Invalid API endpoint: {0}")]
    Endpoint(#[from] http::uri::InvalidUri),

    #[error("Client build error: {0}")]
    Build(#[from] kube::Error),
}

pub type MemberClusterResult<T> = std::result::Result<T, MemberClusterError>;

#[derive(Error, Debug)]
pub enum MemberClusterError {
    #[error("Kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Request build error: {0}")]
    Request(#[from] http::Error),
}

pub type NodeSummaryResult<T> = std::result::Result<T, NodeSummaryError>;

#[derive(Error, Debug)]
pub enum NodeSummaryError {
    #[error("Node list error: {0}")]
    NodeList(#[source] MemberClusterError),

    #[error("Pod list error: {0}")]
    PodList(#[source] MemberClusterError),
}

pub mod client;
pub mod cluster_status;
pub mod conditions;
pub mod enablements;
pub mod health;
pub mod node_summary;
