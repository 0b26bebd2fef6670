use kube::runtime::predicates;
use kube::ResourceExt;

/// Change marker of a watched Cluster.
///
/// Spec changes bump the generation while status writes do not, so the
/// controller is not woken up by its own status updates. Once deletion
/// started every change counts, the generation no longer moves then.
pub fn generation_with_deletion(obj: &impl ResourceExt) -> Option<u64> {
    match obj.meta().deletion_timestamp {
        Some(_) => predicates::resource_version(obj),
        None => predicates::generation(obj),
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use super::*;
    use crate::api::cluster::{Cluster, ClusterSpec};

    fn cluster(generation: i64, resource_version: &str) -> Cluster {
        let mut cluster = Cluster::new("member-1", ClusterSpec::default());
        cluster.metadata.generation = Some(generation);
        cluster.metadata.resource_version = Some(resource_version.to_string());
        cluster
    }

    #[test]
    fn test_status_writes_are_filtered() {
        assert_eq!(
            generation_with_deletion(&cluster(1, "10")),
            generation_with_deletion(&cluster(1, "11"))
        );
        assert_ne!(
            generation_with_deletion(&cluster(1, "10")),
            generation_with_deletion(&cluster(2, "11"))
        );
    }

    #[test]
    fn test_deleting_cluster_tracks_resource_version() {
        let deleting = |rv: &str| {
            let mut cluster = cluster(1, rv);
            cluster.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            cluster
        };

        assert_ne!(
            generation_with_deletion(&deleting("10")),
            generation_with_deletion(&deleting("11"))
        );
    }
}
