use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{CustomResource, ResourceExt as _};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quantity::{resource_lists_semantic_eq, ResourceList};

/// Finalizer attached by the cluster lifecycle controller. Status is only
/// tracked once it is present.
pub static CLUSTER_CONTROLLER_FINALIZER: &str = "cluster.multicluster.io/cluster-controller";

/// Condition type summarizing member cluster readiness.
pub static CLUSTER_CONDITION_READY: &str = "Ready";

/// Namespace used for kubeconfig secrets when the cluster does not reference one.
pub static DEFAULT_SECRET_NAMESPACE: &str = "cluster-system";

/// A member cluster registered with the control plane
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[kube(
    kind = "Cluster",
    group = "cluster.multicluster.io",
    version = "v1alpha1",
    status = "ClusterStatus",
    shortname = "mc",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".status.kubernetesVersion"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// API server URL of the member cluster. Overrides the server from the kubeconfig.
    pub api_endpoint: Option<String>,

    /// Secret holding the member cluster kubeconfig under the `value` key.
    /// Defaults to `<cluster>-kubeconfig` in the `cluster-system` namespace.
    pub secret_ref: Option<LocalSecretReference>,

    /// Skip TLS verification of the member API server.
    #[serde(rename = "insecureSkipTLSVerification")]
    pub insecure_skip_tls_verification: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    pub namespace: String,
    pub name: String,
}

/// Observed state of a member cluster. Replaced as a whole on every sync.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_enablements: Vec<APIEnablement>,

    #[serde(default)]
    pub node_summary: NodeSummary,
}

/// Resources served under a single group version.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIEnablement {
    pub group_version: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub total_num: i32,
    pub ready_num: i32,
    #[serde(default, skip_serializing_if = "ResourceList::is_empty")]
    pub allocatable: ResourceList,
    #[serde(default, skip_serializing_if = "ResourceList::is_empty")]
    pub used: ResourceList,
}

impl ClusterStatus {
    /// Whether the status carries a `Ready` condition with status `True`.
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.type_ == CLUSTER_CONDITION_READY && c.status == "True")
    }

    /// Equality that treats quantities by value rather than by text.
    pub fn semantic_eq(&self, other: &ClusterStatus) -> bool {
        self.conditions == other.conditions
            && self.kubernetes_version == other.kubernetes_version
            && self.api_enablements == other.api_enablements
            && self.node_summary.semantic_eq(&other.node_summary)
    }
}

impl NodeSummary {
    pub fn semantic_eq(&self, other: &NodeSummary) -> bool {
        self.total_num == other.total_num
            && self.ready_num == other.ready_num
            && resource_lists_semantic_eq(&self.allocatable, &other.allocatable)
            && resource_lists_semantic_eq(&self.used, &other.used)
    }
}

impl Cluster {
    pub fn deletion_in_progress(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_controller_finalizer(&self) -> bool {
        self.finalizers()
            .iter()
            .any(|f| f == CLUSTER_CONTROLLER_FINALIZER)
    }

    /// Namespace and name of the secret carrying the kubeconfig.
    pub fn kubeconfig_secret(&self) -> LocalSecretReference {
        self.spec
            .secret_ref
            .clone()
            .unwrap_or_else(|| LocalSecretReference {
                namespace: DEFAULT_SECRET_NAMESPACE.to_string(),
                name: format!("{}-kubeconfig", self.name_any()),
            })
    }

    /// Current status, empty when the cluster was never synced.
    pub fn current_status(&self) -> ClusterStatus {
        self.status.clone().unwrap_or_default()
    }
}
