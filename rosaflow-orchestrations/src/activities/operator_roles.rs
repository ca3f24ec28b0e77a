//! Operator role deletion

use tracing::info;

use crate::error::RemoteError;
use crate::rosa_cli::RosaCli;

/// Which operator roles to delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorRoles<'a> {
    /// Roles carrying this prefix; works after the cluster is gone
    Prefix(&'a str),
    /// Roles referenced by this cluster
    Cluster(&'a str),
}

pub async fn delete(rosa: &RosaCli, roles: OperatorRoles<'_>) -> Result<(), RemoteError> {
    info!(roles = ?roles, "Deleting operator roles");

    let (flag, value) = match roles {
        OperatorRoles::Prefix(prefix) => ("--prefix", prefix),
        OperatorRoles::Cluster(cluster_id) => ("--cluster", cluster_id),
    };
    rosa.run(["delete", "operator-roles", flag, value, "--mode", "auto", "--yes"])
        .await?;

    info!(roles = ?roles, "Operator roles deleted");
    Ok(())
}
