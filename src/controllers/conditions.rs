use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::api::cluster::{ClusterStatus, CLUSTER_CONDITION_READY};

use super::health::ClusterHealth;

pub static CLUSTER_READY_REASON: &str = "ClusterReady";
pub static CLUSTER_HEALTHY_MESSAGE: &str =
    "cluster is reachable and health endpoint responded with ok";
pub static CLUSTER_NOT_READY_REASON: &str = "ClusterNotReady";
pub static CLUSTER_UNHEALTHY_MESSAGE: &str =
    "cluster is reachable but health endpoint responded without ok";
pub static CLUSTER_NOT_REACHABLE_REASON: &str = "ClusterNotReachable";
pub static CLUSTER_NOT_REACHABLE_MESSAGE: &str = "cluster is not reachable";

/// Ready condition describing the observed health, stamped with `now`.
pub fn ready_condition(health: ClusterHealth, now: Time) -> Condition {
    let (status, reason, message) = match health {
        ClusterHealth { online: false, .. } => (
            "False",
            CLUSTER_NOT_REACHABLE_REASON,
            CLUSTER_NOT_REACHABLE_MESSAGE,
        ),
        ClusterHealth { healthy: false, .. } => {
            ("False", CLUSTER_NOT_READY_REASON, CLUSTER_UNHEALTHY_MESSAGE)
        }
        ClusterHealth { .. } => ("True", CLUSTER_READY_REASON, CLUSTER_HEALTHY_MESSAGE),
    };

    Condition {
        type_: CLUSTER_CONDITION_READY.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: now,
        observed_generation: None,
    }
}

/// Conditions of a freshly observed status. There is only ever one.
pub fn generate_ready_condition(health: ClusterHealth) -> Vec<Condition> {
    vec![ready_condition(health, Time(Utc::now()))]
}

/// Keeps the previous transition time while readiness did not flip.
///
/// Unreachable and unhealthy both count as not ready, so moving between them
/// keeps the timestamp.
pub fn set_transition_time(old: &ClusterStatus, new: &mut ClusterStatus) {
    if old.is_ready() != new.is_ready() {
        return;
    }
    if let Some(previous) = old.conditions.first() {
        for condition in new.conditions.iter_mut() {
            condition.last_transition_time = previous.last_transition_time.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};

    use super::*;

    fn at(seconds: i64) -> Time {
        Time(DateTime::UNIX_EPOCH + Duration::seconds(seconds))
    }

    fn status(health: ClusterHealth, seconds: i64) -> ClusterStatus {
        ClusterStatus {
            conditions: vec![ready_condition(health, at(seconds))],
            ..Default::default()
        }
    }

    #[test]
    fn test_condition_templates() {
        let offline = ready_condition(ClusterHealth::OFFLINE, at(0));
        assert_eq!(offline.type_, "Ready");
        assert_eq!(offline.status, "False");
        assert_eq!(offline.reason, "ClusterNotReachable");
        assert_eq!(offline.message, "cluster is not reachable");

        let unhealthy = ready_condition(ClusterHealth::UNHEALTHY, at(0));
        assert_eq!(unhealthy.status, "False");
        assert_eq!(unhealthy.reason, "ClusterNotReady");
        assert_eq!(
            unhealthy.message,
            "cluster is reachable but health endpoint responded without ok"
        );

        let healthy = ready_condition(ClusterHealth::HEALTHY, at(0));
        assert_eq!(healthy.status, "True");
        assert_eq!(healthy.reason, "ClusterReady");
        assert_eq!(
            healthy.message,
            "cluster is reachable and health endpoint responded with ok"
        );
    }

    #[test]
    fn test_offline_ignores_healthy_flag() {
        let condition = ready_condition(
            ClusterHealth {
                online: false,
                healthy: true,
            },
            at(0),
        );
        assert_eq!(condition.reason, CLUSTER_NOT_REACHABLE_REASON);
    }

    #[test]
    fn test_generate_single_condition() {
        assert_eq!(generate_ready_condition(ClusterHealth::HEALTHY).len(), 1);
    }

    #[test]
    fn test_transition_time_kept_while_ready() {
        let old = status(ClusterHealth::HEALTHY, 10);
        let mut new = status(ClusterHealth::HEALTHY, 20);

        set_transition_time(&old, &mut new);

        assert_eq!(new.conditions[0].last_transition_time, at(10));
    }

    #[test]
    fn test_transition_time_advances_on_flip() {
        let old = status(ClusterHealth::HEALTHY, 10);
        let mut new = status(ClusterHealth::OFFLINE, 20);

        set_transition_time(&old, &mut new);

        assert_eq!(new.conditions[0].last_transition_time, at(20));
    }

    #[test]
    fn test_not_ready_sub_states_share_transition_time() {
        let old = status(ClusterHealth::OFFLINE, 10);
        let mut new = status(ClusterHealth::UNHEALTHY, 20);

        set_transition_time(&old, &mut new);

        assert_eq!(new.conditions[0].last_transition_time, at(10));
        assert_eq!(new.conditions[0].reason, CLUSTER_NOT_READY_REASON);
    }

    #[test]
    fn test_first_observation_keeps_fresh_time() {
        let old = ClusterStatus::default();
        let mut new = status(ClusterHealth::OFFLINE, 20);

        set_transition_time(&old, &mut new);

        assert_eq!(new.conditions[0].last_transition_time, at(20));
    }
}
