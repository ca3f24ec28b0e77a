//! Create cluster saga

use rosaflow_models::{AccountRoles, DefaultedCreateOptions, DEFAULT_ACCOUNT_ROLES_PREFIX};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::compensation::{CreatedResource, CreatedResources};
use super::Saga;
use crate::activities::network_stack::NetworkStackRequest;
use crate::activities::versions::{self, NIGHTLY_CHANNEL_GROUP, NIGHTLY_WAIT_TIMEOUT};
use crate::activities::{account_roles, cluster, network_stack, oidc_config, regions};
use crate::collaborators::{HealthCheckRequest, HealthTopology};
use crate::error::{ClusterError, Phase, ValidationError};
use crate::names::orchestrations;
use crate::provider::Provider;
use crate::wait::WaitOptions;

/// Provision a cluster and wait until it is installed and healthy.
///
/// Dependencies created before the create call are torn down again if the
/// saga fails up to that point. Returns the new cluster id.
#[tracing::instrument(
    name = "create_cluster",
    parent = provider.span(),
    skip_all,
    fields(cluster_name = %options.cluster_name, version = %options.version)
)]
pub async fn create_cluster(
    provider: &Provider,
    options: &DefaultedCreateOptions,
    cancel: &CancellationToken,
) -> Result<String, ClusterError> {
    info!(
        hosted_cp = options.hosted_cp,
        sts = options.sts,
        private_link = options.private_link,
        region = %provider.region(),
        "Creating cluster"
    );

    let mut saga = Saga::new(orchestrations::CREATE_CLUSTER, provider, cancel);
    let mut created = CreatedResources::default();

    match create_cluster_impl(&mut saga, options, &mut created).await {
        Ok(cluster_id) => {
            info!(cluster_id = %cluster_id, "Cluster created successfully");
            Ok(cluster_id)
        }
        Err(e) => {
            error!(error = %e, "Failed to create cluster");
            if !created.is_empty() {
                info!("Cleaning up resources created before the failure");
                match created.compensate(provider).await {
                    0 => info!("Cleanup complete"),
                    failures => warn!(failures, "Cleanup incomplete, some resources were left behind"),
                }
            }
            Err(e)
        }
    }
}

async fn create_cluster_impl(
    saga: &mut Saga<'_>,
    options: &DefaultedCreateOptions,
    created: &mut CreatedResources,
) -> Result<String, ClusterError> {
    let provider = saga.provider;
    let cancel = saga.cancel;
    let poll_interval = provider.settings().poll_interval;
    let channel_group = options.channel_group();

    ValidationError::check(required_problems(options)).map_err(|e| saga.fail(Phase::Validation, e))?;

    if channel_group == NIGHTLY_CHANNEL_GROUP {
        info!("Step 0: Waiting for nightly version to be available");
        saga.phase(
            Phase::NightlyVersion,
            versions::wait_for_version(
                provider.resources(),
                &options.version,
                channel_group,
                options.hosted_cp,
                WaitOptions::new(NIGHTLY_WAIT_TIMEOUT).with_interval(poll_interval),
                cancel,
            ),
        )
        .await?;
    }

    info!("Step 1: Checking region");
    saga.phase(
        Phase::Region,
        regions::region_check(provider.resources(), provider.region(), options.hosted_cp, options.multi_az),
    )
    .await?;

    let mut roles = AccountRoles::default();
    let mut oidc_config_id = options.oidc_config_id.clone();

    if options.hosted_cp || options.sts {
        info!("Step 2: Resolving account roles");
        let major_minor = saga
            .phase(Phase::AccountRoles, async { versions::major_minor(&options.version) })
            .await?;
        let prefix = if options.use_default_account_roles_prefix {
            format!("{}-{}", DEFAULT_ACCOUNT_ROLES_PREFIX, major_minor)
        } else {
            options.cluster_name.clone()
        };

        let existing = saga
            .phase(
                Phase::AccountRoles,
                account_roles::lookup(provider.rosa(), provider.partition(), &prefix, &major_minor, options.hosted_cp),
            )
            .await?;
        roles = match existing {
            Some(roles) => roles,
            None => {
                if !options.use_default_account_roles_prefix {
                    created.push(CreatedResource::AccountRoles { prefix: prefix.clone() });
                }
                saga.phase(
                    Phase::AccountRoles,
                    account_roles::create(
                        provider.rosa(),
                        provider.partition(),
                        &prefix,
                        &major_minor,
                        channel_group,
                        options.hosted_cp,
                    ),
                )
                .await?
            }
        };

        if oidc_config_id.is_none() {
            info!("Step 3: Resolving OIDC config");
            let installer = roles.installer.as_deref().unwrap_or_default();
            let resolved = saga
                .phase(
                    Phase::OidcConfig,
                    oidc_config::resolve(
                        provider.rosa(),
                        provider.resources(),
                        provider.partition(),
                        &options.cluster_name,
                        installer,
                    ),
                )
                .await?;
            if resolved.created {
                created.push(CreatedResource::OidcConfig {
                    id: resolved.value.clone(),
                });
            }
            oidc_config_id = Some(resolved.value);
        }
    }

    let mut subnet_ids = options.subnet_ids.clone();
    if (options.hosted_cp || options.private_link) && subnet_ids.is_none() {
        info!("Step 4: Creating network stack");
        let request = NetworkStackRequest {
            cluster_name: &options.cluster_name,
            region: provider.region(),
            working_dir: options.working_dir(),
            hosted_cp: options.hosted_cp,
            private_link: options.private_link,
            multi_az: options.multi_az,
            machine_cidr: options.machine_cidr(),
        };
        if network_stack::has_state(options.working_dir()).await {
            warn!(working_dir = %options.working_dir().display(), "Working directory already holds terraform state, it will not be cleaned up on failure");
        } else {
            created.push(CreatedResource::NetworkStack {
                cluster_name: options.cluster_name.clone(),
                region: provider.region().to_string(),
                working_dir: options.working_dir().to_path_buf(),
            });
        }
        let stack = saga
            .phase(Phase::NetworkStack, network_stack::create(provider.infra(), &request))
            .await?;
        subnet_ids = Some(stack.subnet_ids());
    }

    info!("Step 5: Validating cluster options");
    let problems = validation_problems(options, &roles, oidc_config_id.as_deref(), subnet_ids.as_deref());
    for problem in &problems {
        error!(problem = %problem, "Create cluster option undefined");
    }
    saga.phase(Phase::Validation, async { ValidationError::check(problems) })
        .await?;

    info!("Step 6: Creating cluster");
    let mut billing_account_id = options.billing_account_id.clone();
    if options.hosted_cp && billing_account_id.is_none() {
        let account = saga.phase(Phase::CreateCall, provider.rosa().whoami()).await?;
        billing_account_id = Some(account.aws_account_id);
    }
    let expiration_time = options
        .expiration
        .filter(|_| !provider.settings().environment.is_production())
        .and_then(|lifetime| chrono::Duration::from_std(lifetime).ok())
        .and_then(|lifetime| chrono::Utc::now().checked_add_signed(lifetime));

    let args = cluster::CreateArgs {
        options,
        region: provider.region(),
        roles: &roles,
        oidc_config_id: oidc_config_id.as_deref(),
        subnet_ids: subnet_ids.as_deref(),
        billing_account_id: billing_account_id.as_deref(),
        expiration_time,
    };
    let cluster_id = saga
        .phase(Phase::CreateCall, cluster::create(provider.rosa(), provider.resources(), &args))
        .await?;
    saga.cluster_id = Some(cluster_id.clone());
    created.disarm();

    info!(cluster_id = %cluster_id, "Step 7: Waiting for cluster to be installed");
    let installed = saga
        .phase(
            Phase::InstallWait,
            cluster::wait_for_install(
                provider.resources(),
                &cluster_id,
                WaitOptions::new(options.install_timeout()).with_interval(poll_interval),
                cancel,
            ),
        )
        .await;
    if let Err(e) = installed {
        if !e.is_cancelled() {
            if let Err(log_err) =
                cluster::save_install_log(provider.rosa(), &options.cluster_name, options.artifact_dir()).await
            {
                warn!(error = %log_err, "Failed to save install log");
            }
        }
        return Err(e);
    }

    if options.skip_health_check {
        info!("Skipping health check");
        return Ok(cluster_id);
    }

    info!(cluster_id = %cluster_id, "Step 8: Checking cluster health");
    let kubeconfig = saga
        .phase(
            Phase::HealthCheck,
            provider
                .kubeconfigs()
                .kubeconfig_file(&cluster_id, options.artifact_dir()),
        )
        .await?;
    let request = HealthCheckRequest {
        topology: if options.hosted_cp {
            HealthTopology::HostedControlPlane {
                expected_compute_nodes: expected_compute_nodes(options),
            }
        } else {
            HealthTopology::Classic {
                report_dir: options.artifact_dir().to_path_buf(),
            }
        },
        timeout: options.health_check_timeout(),
        interval: poll_interval,
    };
    saga.phase(
        Phase::HealthCheck,
        provider.health().cluster_healthy(&kubeconfig, &request, cancel),
    )
    .await?;

    Ok(cluster_id)
}

fn expected_compute_nodes(options: &DefaultedCreateOptions) -> u32 {
    if options.uses_replica_bounds() {
        options.min_replicas
    } else {
        options.replicas
    }
}

/// Inputs every later step depends on; checked before anything is created
fn required_problems(options: &DefaultedCreateOptions) -> Vec<String> {
    let mut problems = Vec::new();
    if options.cluster_name.trim().is_empty() {
        problems.push("cluster name is required".to_string());
    }
    if options.version.trim().is_empty() {
        problems.push("cluster version is required".to_string());
    }
    problems
}

/// Everything missing from a create call, collected in one pass
fn validation_problems(
    options: &DefaultedCreateOptions,
    roles: &AccountRoles,
    oidc_config_id: Option<&str>,
    subnet_ids: Option<&str>,
) -> Vec<String> {
    let mut problems = required_problems(options);

    if options.hosted_cp {
        if oidc_config_id.is_none() {
            problems.push("oidc config id is required for hosted control plane clusters".to_string());
        }
        if subnet_ids.is_none() {
            problems.push("subnet ids are required for hosted control plane clusters".to_string());
        }
    }

    if options.hosted_cp || options.sts {
        let required = [
            (&roles.control_plane, "control plane"),
            (&roles.installer, "installer"),
            (&roles.support, "support"),
            (&roles.worker, "worker"),
        ];
        for (arn, role) in required {
            if arn.is_none() {
                problems.push(format!("iam role arn for {} is required", role));
            }
        }
    }

    problems
}
