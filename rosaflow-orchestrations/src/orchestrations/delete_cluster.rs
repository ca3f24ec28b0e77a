//! Delete cluster saga

use rosaflow_models::{DefaultedDeleteOptions, DEFAULT_ACCOUNT_ROLES_PREFIX};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::Saga;
use crate::activities::operator_roles::{self, OperatorRoles};
use crate::activities::{account_roles, cluster, network_stack, oidc_config};
use crate::error::{ClusterError, Phase, PhaseError};
use crate::names::orchestrations;
use crate::provider::Provider;
use crate::wait::WaitOptions;

/// Delete a cluster, wait until it is gone, then remove the dependencies
/// that belong to it. Shared default-prefix account roles are left alone.
#[tracing::instrument(
    name = "delete_cluster",
    parent = provider.span(),
    skip_all,
    fields(cluster_name = %options.cluster_name)
)]
pub async fn delete_cluster(
    provider: &Provider,
    options: &DefaultedDeleteOptions,
    cancel: &CancellationToken,
) -> Result<(), ClusterError> {
    info!(
        hosted_cp = options.hosted_cp,
        sts = options.sts,
        private_link = options.private_link,
        "Deleting cluster"
    );

    let mut saga = Saga::new(orchestrations::DELETE_CLUSTER, provider, cancel);
    match delete_cluster_impl(&mut saga, options).await {
        Ok(()) => {
            info!("Cluster deleted successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to delete cluster");
            Err(e)
        }
    }
}

async fn delete_cluster_impl(saga: &mut Saga<'_>, options: &DefaultedDeleteOptions) -> Result<(), ClusterError> {
    let provider = saga.provider;
    let rosa = provider.rosa();

    info!("Step 1: Locating cluster");
    let record = saga
        .phase(Phase::Lookup, async {
            provider
                .resources()
                .find_cluster(&options.cluster_name)
                .await?
                .ok_or_else(|| PhaseError::ClusterNotFound(options.cluster_name.clone()))
        })
        .await?;
    saga.cluster_id = Some(record.id.clone());

    let oidc_config_id = if options.hosted_cp || options.private_link {
        record.oidc_config_id.clone()
    } else {
        None
    };

    info!(cluster_id = %record.id, "Step 2: Deleting cluster");
    saga.phase(Phase::DeleteCall, cluster::delete(rosa, &record.id))
        .await?;

    info!(cluster_id = %record.id, "Step 3: Waiting for cluster to be deleted");
    saga.phase(
        Phase::UninstallWait,
        cluster::wait_for_uninstall(
            provider.resources(),
            &record.id,
            WaitOptions::new(options.uninstall_timeout()).with_interval(provider.settings().poll_interval),
            saga.cancel,
        ),
    )
    .await?;

    if options.sts || options.private_link {
        info!("Step 4: Deleting operator roles and OIDC provider");
        let roles = match record.operator_role_prefix.as_deref() {
            Some(prefix) => OperatorRoles::Prefix(prefix),
            None => OperatorRoles::Cluster(&record.id),
        };
        saga.phase(Phase::OperatorRoles, operator_roles::delete(rosa, roles))
            .await?;
        saga.phase(
            Phase::OidcProvider,
            oidc_config::delete_provider(rosa, &record.id, oidc_config_id.as_deref()),
        )
        .await?;
    }

    if options.hosted_cp || options.private_link {
        if options.delete_oidc_config {
            match oidc_config_id.as_deref() {
                Some(id) => {
                    info!(oidc_config_id = %id, "Step 5: Deleting OIDC config");
                    saga.phase(Phase::OidcConfig, oidc_config::delete(rosa, id))
                        .await?;
                }
                None => info!("Cluster has no OIDC config, skipping deletion"),
            }
        }

        if options.delete_network_stack {
            info!("Step 6: Deleting network stack");
            saga.phase(
                Phase::NetworkStack,
                network_stack::delete(provider.infra(), &record.name, provider.region(), options.working_dir()),
            )
            .await?;
        }
    }

    if options.sts {
        let shared = record
            .role_arn
            .as_deref()
            .is_some_and(|arn| arn.contains(DEFAULT_ACCOUNT_ROLES_PREFIX));
        if shared {
            info!("Cluster uses shared default-prefix account roles, skipping deletion");
        } else {
            info!("Step 7: Deleting account roles");
            saga.phase(Phase::AccountRoles, account_roles::delete(rosa, &record.name))
                .await?;
        }
    }

    Ok(())
}
