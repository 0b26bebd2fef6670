use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::api::cluster::NodeSummary;
use crate::quantity::{self, Format, ParsedQuantity, ResourceList};

use super::client::MemberClusterClient;
use super::{NodeSummaryError, NodeSummaryResult};

pub static RESOURCE_CPU: &str = "cpu";
pub static RESOURCE_MEMORY: &str = "memory";

static CONDITION_READY: &str = "Ready";
static POD_RUNNING: &str = "Running";

/// Compute requested by a set of containers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestResource {
    pub milli_cpu: i64,
    pub memory: i64,
}

impl RequestResource {
    /// Adds cpu and memory requests, ignoring any other resource.
    pub fn add_resource(&mut self, requests: &ResourceList) {
        for (name, quantity) in requests {
            let Ok(parsed) = quantity::parse(quantity) else {
                debug!("Skipping unparseable {name} request `{}`", quantity.0);
                continue;
            };
            if name == RESOURCE_CPU {
                self.milli_cpu = self.milli_cpu.saturating_add(clamp(parsed.milli_value()));
            } else if name == RESOURCE_MEMORY {
                self.memory = self.memory.saturating_add(clamp(parsed.value()));
            }
        }
    }

    /// Folds the requests of every container of the pod.
    pub fn for_pod(pod: &Pod) -> Self {
        pod.spec
            .iter()
            .flat_map(|spec| spec.containers.iter())
            .filter_map(|c| c.resources.as_ref()?.requests.as_ref())
            .fold(Self::default(), |mut acc, requests| {
                acc.add_resource(requests);
                acc
            })
    }

    pub fn add(self, other: RequestResource) -> Self {
        Self {
            milli_cpu: self.milli_cpu.saturating_add(other.milli_cpu),
            memory: self.memory.saturating_add(other.memory),
        }
    }
}

fn clamp(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// Node count, readiness and compute totals of the member cluster.
pub async fn node_summary(client: &dyn MemberClusterClient) -> NodeSummaryResult<NodeSummary> {
    let nodes = client
        .list_nodes()
        .await
        .map_err(NodeSummaryError::NodeList)?;

    let total_num = i32::try_from(nodes.len()).unwrap_or(i32::MAX);
    let ready_num = i32::try_from(nodes.iter().filter(|n| node_ready(n)).count()).unwrap_or(i32::MAX);
    let allocatable = cluster_allocatable(&nodes);

    let pods = client
        .list_all_pods()
        .await
        .map_err(NodeSummaryError::PodList)?;
    let used = used_resource(&pods);

    Ok(NodeSummary {
        total_num,
        ready_num,
        allocatable,
        used,
    })
}

pub fn node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_READY && c.status == "True")
        })
}

/// Per resource sum of the allocatable quantities of all nodes.
pub fn cluster_allocatable(nodes: &[Node]) -> ResourceList {
    let mut totals: BTreeMap<String, ParsedQuantity> = BTreeMap::new();

    for node in nodes {
        let Some(allocatable) = node.status.as_ref().and_then(|s| s.allocatable.as_ref()) else {
            continue;
        };
        for (name, value) in allocatable {
            match quantity::parse(value) {
                Ok(parsed) => {
                    totals
                        .entry(name.clone())
                        .and_modify(|total| *total = total.add(parsed))
                        .or_insert(parsed);
                }
                Err(e) => warn!(
                    "Skipping allocatable {name} of node {}: {e}",
                    node.name_any()
                ),
            }
        }
    }

    totals
        .into_iter()
        .map(|(name, total)| (name, total.to_quantity()))
        .collect()
}

/// A pod only consumes serving capacity once it is running and ready.
pub fn pod_serving(pod: &Pod) -> bool {
    let Some(status) = pod.status.as_ref() else {
        return false;
    };

    status.phase.as_deref() == Some(POD_RUNNING)
        && status.conditions.as_ref().is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_READY && c.status == "True")
        })
}

/// CPU and memory requested by running and ready pods.
pub fn used_resource(pods: &[Pod]) -> ResourceList {
    let requested = pods
        .iter()
        .filter(|pod| pod_serving(pod))
        .map(RequestResource::for_pod)
        .fold(RequestResource::default(), RequestResource::add);

    [
        (
            RESOURCE_CPU.to_string(),
            ParsedQuantity::from_milli(requested.milli_cpu.into(), Format::DecimalSI).to_quantity(),
        ),
        (
            RESOURCE_MEMORY.to_string(),
            ParsedQuantity::from_value(requested.memory.into(), Format::BinarySI).to_quantity(),
        ),
    ]
    .into()
}
