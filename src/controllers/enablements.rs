use crate::api::cluster::APIEnablement;

use super::client::MemberClusterClient;
use super::MemberClusterResult;

/// Lists the APIs installed in the member cluster, one entry per group version.
///
/// Entries and resource names are sorted, so discovery order does not show up
/// as a status change.
pub async fn api_enablements(
    client: &dyn MemberClusterClient,
) -> MemberClusterResult<Vec<APIEnablement>> {
    let mut enablements: Vec<APIEnablement> = client
        .list_api_resources()
        .await?
        .into_iter()
        .map(|list| {
            let mut resources: Vec<String> = list.resources.into_iter().map(|r| r.name).collect();
            resources.sort();
            resources.dedup();
            APIEnablement {
                group_version: list.group_version,
                resources,
            }
        })
        .collect();

    enablements.sort_by(|a, b| a.group_version.cmp(&b.group_version));
    Ok(enablements)
}
