use std::time::Duration;

use anyhow::{Context, Result};
use rosaflow_models::{CreateClusterOptions, DeleteClusterOptions};
use rosaflow_orchestrations::{create_cluster, delete_cluster, ClusterError, Provider};
use tokio_util::sync::CancellationToken;

use crate::cli::{CreateArgs, DeleteArgs};
use crate::config::Config;

fn minutes(value: Option<u64>) -> Option<Duration> {
    value.map(|m| Duration::from_secs(m * 60))
}

pub fn create_options(args: CreateArgs) -> CreateClusterOptions {
    CreateClusterOptions {
        channel_group: args.channel_group,
        hosted_cp: args.hosted_cp,
        multi_az: args.multi_az,
        sts: args.sts,
        private_link: args.private_link,
        mint_mode: args.mint_mode,
        fips: args.fips,
        enable_autoscaling: args.enable_autoscaling,
        etcd_encryption: args.etcd_encryption,
        skip_health_check: args.skip_health_check,
        use_default_account_roles_prefix: args.default_account_roles_prefix,
        compute_machine_type: args.compute_machine_type,
        replicas: args.replicas,
        min_replicas: args.min_replicas,
        max_replicas: args.max_replicas,
        host_prefix: args.host_prefix,
        machine_cidr: args.machine_cidr,
        pod_cidr: args.pod_cidr,
        service_cidr: args.service_cidr,
        network_type: args.network_type,
        http_proxy: args.http_proxy,
        https_proxy: args.https_proxy,
        no_proxy: args.no_proxy,
        additional_trust_bundle_file: args.additional_trust_bundle_file,
        oidc_config_id: args.oidc_config_id,
        subnet_ids: args.subnet_ids,
        billing_account_id: args.billing_account_id,
        properties: args.properties.into_iter().collect(),
        install_timeout: minutes(args.install_timeout_minutes),
        health_check_timeout: minutes(args.health_check_timeout_minutes),
        expiration: args.expiration_hours.map(|h| Duration::from_secs(h * 3600)),
        artifact_dir: args.artifact_dir,
        working_dir: args.working_dir,
        ..CreateClusterOptions::new(args.name, args.version)
    }
}

pub fn delete_options(args: DeleteArgs) -> DeleteClusterOptions {
    DeleteClusterOptions {
        hosted_cp: args.hosted_cp,
        sts: args.sts,
        private_link: args.private_link,
        mint_mode: args.mint_mode,
        delete_network_stack: args.delete_network_stack,
        delete_oidc_config: args.delete_oidc_config,
        uninstall_timeout: minutes(args.uninstall_timeout_minutes),
        artifact_dir: args.artifact_dir,
        working_dir: args.working_dir,
        ..DeleteClusterOptions::new(args.name)
    }
}

/// Cancel the token on Ctrl-C so the running saga stops at its next phase boundary
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn connect() -> Result<Provider> {
    let config = Config::load()?;
    Provider::connect(config.provider_config())
        .await
        .context("Failed to connect to the cluster manager")
}

fn report(err: ClusterError) -> anyhow::Error {
    eprintln!("✗ {} failed during {:?} ({:?})", err.action, err.phase, err.kind());
    if let Some(id) = &err.cluster_id {
        eprintln!("  Cluster ID: {}", id);
    }
    err.into()
}

pub async fn run_create(args: CreateArgs) -> Result<()> {
    let options = create_options(args).with_defaults();
    let provider = connect().await?;
    let cancel = cancel_on_interrupt();

    let cluster_id = create_cluster(&provider, &options, &cancel)
        .await
        .map_err(report)?;

    println!("✓ Cluster created");
    println!("  Name:       {}", options.cluster_name);
    println!("  Cluster ID: {}", cluster_id);
    println!("  Region:     {}", provider.region());
    if !options.skip_health_check {
        println!("  Kubeconfig: {}", options.artifact_dir().join(format!("{}-kubeconfig", cluster_id)).display());
    }
    Ok(())
}

pub async fn run_delete(args: DeleteArgs) -> Result<()> {
    let options = delete_options(args).with_defaults();
    let provider = connect().await?;
    let cancel = cancel_on_interrupt();

    delete_cluster(&provider, &options, &cancel)
        .await
        .map_err(report)?;

    println!("✓ Cluster {} deleted", options.cluster_name);
    Ok(())
}
