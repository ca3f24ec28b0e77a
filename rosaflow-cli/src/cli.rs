use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Rosaflow - ROSA cluster lifecycle from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Create a cluster together with the roles, OIDC config and network it needs
    Create(CreateArgs),

    /// Delete a cluster and the dependencies that belong to it
    Delete(DeleteArgs),

    /// List the regions available for a topology
    Regions {
        /// Only regions that support hosted control planes
        #[arg(long)]
        hosted_cp: bool,

        /// Only regions that support multi-AZ clusters
        #[arg(long)]
        multi_az: bool,

        #[arg(short, long, value_enum, default_value = "table")]
        output: Output,
    },

    /// List the versions of a channel group
    Versions {
        #[arg(long, default_value = "stable")]
        channel_group: String,

        /// Only versions enabled for hosted control planes
        #[arg(long)]
        hosted_cp: bool,

        /// Semver constraint, may be repeated (a version matching any is kept)
        #[arg(short, long = "constraint")]
        constraints: Vec<String>,

        #[arg(short, long, value_enum, default_value = "table")]
        output: Output,
    },
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Cluster name
    pub name: String,

    /// OpenShift version, e.g. 4.14.3
    #[arg(long)]
    pub version: String,

    #[arg(long)]
    pub channel_group: Option<String>,

    /// Hosted control plane (implies --sts)
    #[arg(long)]
    pub hosted_cp: bool,

    #[arg(long)]
    pub multi_az: bool,

    #[arg(long)]
    pub sts: bool,

    #[arg(long)]
    pub private_link: bool,

    #[arg(long)]
    pub mint_mode: bool,

    #[arg(long)]
    pub fips: bool,

    #[arg(long)]
    pub enable_autoscaling: bool,

    #[arg(long)]
    pub etcd_encryption: bool,

    #[arg(long)]
    pub skip_health_check: bool,

    /// Use the shared ManagedOpenShift account roles instead of per-cluster ones
    #[arg(long)]
    pub default_account_roles_prefix: bool,

    #[arg(long)]
    pub compute_machine_type: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub replicas: u32,

    #[arg(long, default_value_t = 0)]
    pub min_replicas: u32,

    #[arg(long, default_value_t = 0)]
    pub max_replicas: u32,

    #[arg(long, default_value_t = 0)]
    pub host_prefix: u32,

    #[arg(long)]
    pub machine_cidr: Option<String>,

    #[arg(long)]
    pub pod_cidr: Option<String>,

    #[arg(long)]
    pub service_cidr: Option<String>,

    #[arg(long)]
    pub network_type: Option<String>,

    #[arg(long)]
    pub http_proxy: Option<String>,

    #[arg(long)]
    pub https_proxy: Option<String>,

    #[arg(long)]
    pub no_proxy: Option<String>,

    #[arg(long)]
    pub additional_trust_bundle_file: Option<String>,

    /// Existing OIDC config to use instead of creating one
    #[arg(long)]
    pub oidc_config_id: Option<String>,

    /// Comma separated subnet ids; skips network stack creation
    #[arg(long)]
    pub subnet_ids: Option<String>,

    #[arg(long)]
    pub billing_account_id: Option<String>,

    /// Cluster property as key=value, may be repeated
    #[arg(long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    #[arg(long)]
    pub install_timeout_minutes: Option<u64>,

    #[arg(long)]
    pub health_check_timeout_minutes: Option<u64>,

    /// Expire the cluster this many hours after creation (ignored in production)
    #[arg(long)]
    pub expiration_hours: Option<u64>,

    /// Where kubeconfig, install and health logs are written
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Where the network stack template is materialized
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Cluster name or id
    pub name: String,

    #[arg(long)]
    pub hosted_cp: bool,

    #[arg(long)]
    pub sts: bool,

    #[arg(long)]
    pub private_link: bool,

    #[arg(long)]
    pub mint_mode: bool,

    /// Destroy the network stack (always done for hosted clusters)
    #[arg(long)]
    pub delete_network_stack: bool,

    #[arg(long)]
    pub delete_oidc_config: bool,

    #[arg(long)]
    pub uninstall_timeout_minutes: Option<u64>,

    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Directory the network stack was created from
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", raw)),
    }
}
