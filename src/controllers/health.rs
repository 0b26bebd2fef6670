use std::time::Duration;

use http::StatusCode;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{error, info};

use super::client::MemberClusterClient;
use super::MemberClusterResult;

/// Readiness endpoint of current API servers.
pub const READINESS_ENDPOINT: &str = "/readyz";

/// Legacy endpoint probed when the readiness endpoint is not installed.
pub const LIVENESS_ENDPOINT: &str = "/healthz";

/// Delay between two probes of an offline cluster.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on probing an offline cluster.
pub const RETRY_TIMEOUT: Duration = Duration::from_secs(2);

const HEALTH_ENDPOINTS: [&str; 2] = [READINESS_ENDPOINT, LIVENESS_ENDPOINT];

/// Observed health of a member cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterHealth {
    pub online: bool,
    pub healthy: bool,
}

impl ClusterHealth {
    pub const OFFLINE: Self = Self {
        online: false,
        healthy: false,
    };

    pub const UNHEALTHY: Self = Self {
        online: true,
        healthy: false,
    };

    pub const HEALTHY: Self = Self {
        online: true,
        healthy: true,
    };
}

/// Probes the health endpoints in order, moving on only when one is not installed.
async fn probe_health_endpoints(client: &dyn MemberClusterClient) -> MemberClusterResult<StatusCode> {
    let mut status = StatusCode::NOT_FOUND;
    for path in HEALTH_ENDPOINTS {
        status = client.probe_endpoint(path).await?;
        if status != StatusCode::NOT_FOUND {
            break;
        }
    }
    Ok(status)
}

/// Single health check of a member cluster.
pub async fn cluster_health(client: &dyn MemberClusterClient, cluster: &str) -> ClusterHealth {
    match probe_health_endpoints(client).await {
        Err(e) => {
            error!("Failed to do cluster health check for cluster {cluster}: {e}");
            ClusterHealth::OFFLINE
        }
        Ok(status) if status.is_success() => ClusterHealth::HEALTHY,
        Ok(status) => {
            info!("Member cluster {cluster} isn't healthy, health endpoint responded {status}");
            ClusterHealth::UNHEALTHY
        }
    }
}

/// Health check bounded by `deadline`. A probe still pending then counts as offline.
async fn cluster_health_until(
    client: &dyn MemberClusterClient,
    cluster: &str,
    deadline: Instant,
) -> ClusterHealth {
    match timeout_at(deadline, cluster_health(client, cluster)).await {
        Ok(health) => health,
        Err(_) => {
            error!("Cluster health check for cluster {cluster} timed out");
            ClusterHealth::OFFLINE
        }
    }
}

/// Health check which keeps polling an offline cluster for up to [`RETRY_TIMEOUT`],
/// so a network blip does not mark the cluster unreachable.
///
/// The bound covers the probes themselves, a hanging member gives up the
/// worker after [`RETRY_TIMEOUT`] as well.
pub async fn cluster_health_with_retry(
    client: &dyn MemberClusterClient,
    cluster: &str,
) -> ClusterHealth {
    let deadline = Instant::now() + RETRY_TIMEOUT;
    let mut health = cluster_health_until(client, cluster, deadline).await;

    while !health.online && Instant::now() < deadline {
        sleep(RETRY_INTERVAL).await;

        health = cluster_health_until(client, cluster, deadline).await;
        if health.online {
            info!("Cluster {cluster} back to online after retry");
        }
    }

    health
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{Node, Pod};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;

    use super::*;
    use crate::controllers::client::MockMemberClusterClient;
    use crate::controllers::MemberClusterError;

    fn unreachable() -> MemberClusterError {
        kube::Error::Service("connection refused".into()).into()
    }

    fn respond(mock: &mut MockMemberClusterClient, path: &'static str, status: StatusCode) {
        mock.expect_probe_endpoint()
            .withf(move |p| p == path)
            .times(1)
            .returning(move |_| Ok(status));
    }

    #[tokio::test]
    async fn test_readiness_endpoint_ok() {
        let mut client = MockMemberClusterClient::new();
        respond(&mut client, READINESS_ENDPOINT, StatusCode::OK);

        assert_eq!(cluster_health(&client, "member").await, ClusterHealth::HEALTHY);
    }

    #[tokio::test]
    async fn test_falls_back_to_liveness_endpoint() {
        let mut client = MockMemberClusterClient::new();
        respond(&mut client, READINESS_ENDPOINT, StatusCode::NOT_FOUND);
        respond(&mut client, LIVENESS_ENDPOINT, StatusCode::OK);

        assert_eq!(cluster_health(&client, "member").await, ClusterHealth::HEALTHY);
    }

    #[tokio::test]
    async fn test_liveness_result_alone_decides() {
        let mut client = MockMemberClusterClient::new();
        respond(&mut client, READINESS_ENDPOINT, StatusCode::NOT_FOUND);
        respond(
            &mut client,
            LIVENESS_ENDPOINT,
            StatusCode::INTERNAL_SERVER_ERROR,
        );

        assert_eq!(cluster_health(&client, "member").await, ClusterHealth::UNHEALTHY);
    }

    #[tokio::test]
    async fn test_no_fallback_on_other_status() {
        let mut client = MockMemberClusterClient::new();
        respond(
            &mut client,
            READINESS_ENDPOINT,
            StatusCode::SERVICE_UNAVAILABLE,
        );

        assert_eq!(cluster_health(&client, "member").await, ClusterHealth::UNHEALTHY);
    }

    #[tokio::test]
    async fn test_transport_error_is_offline() {
        let mut client = MockMemberClusterClient::new();
        client
            .expect_probe_endpoint()
            .withf(|p| p == READINESS_ENDPOINT)
            .times(1)
            .returning(|_| Err(unreachable()));

        assert_eq!(cluster_health(&client, "member").await, ClusterHealth::OFFLINE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_timeout() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut client = MockMemberClusterClient::new();
        client.expect_probe_endpoint().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(unreachable())
        });

        let start = Instant::now();
        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::OFFLINE);
        assert!(start.elapsed() >= RETRY_TIMEOUT);
        assert!(start.elapsed() < RETRY_TIMEOUT + RETRY_INTERVAL);
        // initial probe plus one per interval
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut client = MockMemberClusterClient::new();
        client.expect_probe_endpoint().returning(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(unreachable()),
                _ => Ok(StatusCode::OK),
            }
        });

        let start = Instant::now();
        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::HEALTHY);
        assert!(start.elapsed() >= RETRY_INTERVAL);
        assert!(start.elapsed() < RETRY_INTERVAL * 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_online_cluster_is_not_retried() {
        let mut client = MockMemberClusterClient::new();
        respond(&mut client, READINESS_ENDPOINT, StatusCode::BAD_GATEWAY);

        let start = Instant::now();
        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::UNHEALTHY);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    /// Member whose health endpoint answers only after `delay`.
    struct SlowMember {
        delay: Duration,
        answer: Option<StatusCode>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MemberClusterClient for SlowMember {
        async fn probe_endpoint(&self, _path: &str) -> MemberClusterResult<StatusCode> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            self.answer.ok_or_else(unreachable)
        }

        async fn server_version(&self) -> MemberClusterResult<String> {
            unimplemented!()
        }

        async fn list_api_resources(&self) -> MemberClusterResult<Vec<APIResourceList>> {
            unimplemented!()
        }

        async fn list_nodes(&self) -> MemberClusterResult<Vec<Node>> {
            unimplemented!()
        }

        async fn list_all_pods(&self) -> MemberClusterResult<Vec<Pod>> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_member_is_cut_at_timeout() {
        let client = SlowMember {
            delay: Duration::from_secs(30),
            answer: None,
            calls: AtomicUsize::new(0),
        };

        let start = Instant::now();
        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::OFFLINE);
        assert!(start.elapsed() >= RETRY_TIMEOUT);
        assert!(start.elapsed() < RETRY_TIMEOUT + RETRY_INTERVAL);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_failures_stay_within_timeout() {
        let client = SlowMember {
            delay: Duration::from_millis(800),
            answer: None,
            calls: AtomicUsize::new(0),
        };

        let start = Instant::now();
        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::OFFLINE);
        assert!(start.elapsed() < RETRY_TIMEOUT + RETRY_INTERVAL);
        // the second probe is cut short at the deadline
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_answer_within_timeout_counts() {
        let client = SlowMember {
            delay: Duration::from_secs(1),
            answer: Some(StatusCode::OK),
            calls: AtomicUsize::new(0),
        };

        let health = cluster_health_with_retry(&client, "member").await;

        assert_eq!(health, ClusterHealth::HEALTHY);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}
