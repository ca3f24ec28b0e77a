use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CHANNEL_GROUP: &str = "stable";
const DEFAULT_COMPUTE_MACHINE_TYPE: &str = "m5.xlarge";
const DEFAULT_MACHINE_CIDR: &str = "10.0.0.0/16";
const DEFAULT_REPLICAS: u32 = 2;
const MULTI_AZ_MIN_REPLICAS: u32 = 3;
const HOSTED_INSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const HOSTED_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const CLASSIC_INSTALL_TIMEOUT: Duration = Duration::from_secs(120 * 60);
const CLASSIC_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(45 * 60);
const DEFAULT_UNINSTALL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Create Cluster
// ============================================================================

/// Everything the caller can ask for when creating a cluster.
///
/// Unset fields acquire their defaults through [`CreateClusterOptions::with_defaults`],
/// which is the only way to obtain the [`DefaultedCreateOptions`] the orchestrator takes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreateClusterOptions {
    /// Cluster name (required)
    pub cluster_name: String,
    /// OpenShift version, e.g. "4.14.3" (required)
    pub version: String,
    /// Channel group (default: "stable")
    pub channel_group: Option<String>,

    /// Hosted control plane topology (implies STS)
    pub hosted_cp: bool,
    pub multi_az: bool,
    /// Short lived tokens through AWS STS
    pub sts: bool,
    pub private_link: bool,
    pub mint_mode: bool,
    pub fips: bool,
    pub enable_autoscaling: bool,
    pub etcd_encryption: bool,
    pub skip_health_check: bool,
    /// Reuse the shared `ManagedOpenShift-<major.minor>` account roles
    pub use_default_account_roles_prefix: bool,

    /// Compute machine type (default: "m5.xlarge")
    pub compute_machine_type: Option<String>,
    /// Flat compute replica count (default: 2, at least 3 for multi-AZ)
    pub replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub host_prefix: u32,

    /// Machine CIDR (default: "10.0.0.0/16")
    pub machine_cidr: Option<String>,
    pub pod_cidr: Option<String>,
    pub service_cidr: Option<String>,
    pub network_type: Option<String>,

    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub additional_trust_bundle_file: Option<String>,

    /// Pre-existing OIDC config, skips OIDC provisioning
    pub oidc_config_id: Option<String>,
    /// Pre-existing comma separated subnet ids, skips network provisioning
    pub subnet_ids: Option<String>,
    /// Billing account for hosted clusters (default: the caller's AWS account)
    pub billing_account_id: Option<String>,

    /// Extra `--properties key:value` pairs
    pub properties: BTreeMap<String, String>,

    pub install_timeout: Option<Duration>,
    pub health_check_timeout: Option<Duration>,
    /// Cluster lifetime before automatic expiry (ignored in production)
    pub expiration: Option<Duration>,

    /// Where logs and reports are written (default: system temp dir)
    pub artifact_dir: Option<PathBuf>,
    /// Terraform working directory (default: `<temp>/rosaflow/<cluster name>`)
    pub working_dir: Option<PathBuf>,
}

impl CreateClusterOptions {
    pub fn new(cluster_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Apply domain defaults exactly once
    pub fn with_defaults(mut self) -> DefaultedCreateOptions {
        if self.hosted_cp {
            self.sts = true;
        }

        let (install_timeout, health_check_timeout) = if self.hosted_cp {
            (HOSTED_INSTALL_TIMEOUT, HOSTED_HEALTH_CHECK_TIMEOUT)
        } else {
            (CLASSIC_INSTALL_TIMEOUT, CLASSIC_HEALTH_CHECK_TIMEOUT)
        };
        self.install_timeout.get_or_insert(install_timeout);
        self.health_check_timeout.get_or_insert(health_check_timeout);

        fill_blank(&mut self.channel_group, DEFAULT_CHANNEL_GROUP);
        fill_blank(&mut self.compute_machine_type, DEFAULT_COMPUTE_MACHINE_TYPE);
        fill_blank(&mut self.machine_cidr, DEFAULT_MACHINE_CIDR);
        if self.private_link {
            self.machine_cidr = Some(DEFAULT_MACHINE_CIDR.to_string());
        }

        if self.replicas == 0 {
            self.replicas = DEFAULT_REPLICAS;
        }
        if self.multi_az && self.replicas < MULTI_AZ_MIN_REPLICAS {
            self.replicas = MULTI_AZ_MIN_REPLICAS;
        }

        for field in [
            &mut self.oidc_config_id,
            &mut self.subnet_ids,
            &mut self.billing_account_id,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }

        if self.artifact_dir.is_none() {
            self.artifact_dir = Some(std::env::temp_dir());
        }
        if self.working_dir.is_none() {
            self.working_dir = Some(default_working_dir(&self.cluster_name));
        }

        DefaultedCreateOptions(self)
    }
}

/// Create options after defaulting. Read-only by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultedCreateOptions(CreateClusterOptions);

impl DefaultedCreateOptions {
    pub fn channel_group(&self) -> &str {
        self.0.channel_group.as_deref().unwrap_or(DEFAULT_CHANNEL_GROUP)
    }

    pub fn compute_machine_type(&self) -> &str {
        self.0
            .compute_machine_type
            .as_deref()
            .unwrap_or(DEFAULT_COMPUTE_MACHINE_TYPE)
    }

    pub fn machine_cidr(&self) -> &str {
        self.0.machine_cidr.as_deref().unwrap_or(DEFAULT_MACHINE_CIDR)
    }

    pub fn install_timeout(&self) -> Duration {
        self.0.install_timeout.unwrap_or(CLASSIC_INSTALL_TIMEOUT)
    }

    pub fn health_check_timeout(&self) -> Duration {
        self.0.health_check_timeout.unwrap_or(CLASSIC_HEALTH_CHECK_TIMEOUT)
    }

    pub fn artifact_dir(&self) -> &Path {
        self.0.artifact_dir.as_deref().unwrap_or(Path::new("."))
    }

    pub fn working_dir(&self) -> &Path {
        self.0.working_dir.as_deref().unwrap_or(Path::new("."))
    }

    /// Whether the flat replica count is replaced by autoscaling bounds
    pub fn uses_replica_bounds(&self) -> bool {
        self.0.enable_autoscaling || self.0.min_replicas > 0 || self.0.max_replicas > 0
    }

    pub fn into_inner(self) -> CreateClusterOptions {
        self.0
    }
}

impl Deref for DefaultedCreateOptions {
    type Target = CreateClusterOptions;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// Delete Cluster
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeleteClusterOptions {
    /// Cluster name or id
    pub cluster_name: String,

    pub hosted_cp: bool,
    pub sts: bool,
    pub private_link: bool,
    pub mint_mode: bool,

    /// Destroy the network stack created for the cluster (implied by hosted_cp)
    pub delete_network_stack: bool,
    /// Delete the cluster's OIDC config
    pub delete_oidc_config: bool,

    pub uninstall_timeout: Option<Duration>,
    pub artifact_dir: Option<PathBuf>,
    /// Must be the directory the network stack was created from
    pub working_dir: Option<PathBuf>,
}

impl DeleteClusterOptions {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            ..Default::default()
        }
    }

    pub fn with_defaults(mut self) -> DefaultedDeleteOptions {
        if self.hosted_cp {
            self.sts = true;
            self.delete_network_stack = true;
        }
        self.uninstall_timeout.get_or_insert(DEFAULT_UNINSTALL_TIMEOUT);
        if self.artifact_dir.is_none() {
            self.artifact_dir = Some(std::env::temp_dir());
        }
        if self.working_dir.is_none() {
            self.working_dir = Some(default_working_dir(&self.cluster_name));
        }
        DefaultedDeleteOptions(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefaultedDeleteOptions(DeleteClusterOptions);

impl DefaultedDeleteOptions {
    pub fn uninstall_timeout(&self) -> Duration {
        self.0.uninstall_timeout.unwrap_or(DEFAULT_UNINSTALL_TIMEOUT)
    }

    pub fn artifact_dir(&self) -> &Path {
        self.0.artifact_dir.as_deref().unwrap_or(Path::new("."))
    }

    pub fn working_dir(&self) -> &Path {
        self.0.working_dir.as_deref().unwrap_or(Path::new("."))
    }
}

impl Deref for DefaultedDeleteOptions {
    type Target = DeleteClusterOptions;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One terraform working directory per cluster name
fn default_working_dir(cluster_name: &str) -> PathBuf {
    std::env::temp_dir().join("rosaflow").join(cluster_name)
}

fn fill_blank(field: &mut Option<String>, default: &str) {
    if field.as_deref().map_or(true, |v| v.trim().is_empty()) {
        *field = Some(default.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults_for_classic_cluster() {
        let options = CreateClusterOptions::new("demo", "4.14.3").with_defaults();

        assert_eq!(options.channel_group(), "stable");
        assert_eq!(options.compute_machine_type(), "m5.xlarge");
        assert_eq!(options.machine_cidr(), "10.0.0.0/16");
        assert_eq!(options.replicas, 2);
        assert!(!options.sts);
        assert_eq!(options.install_timeout(), Duration::from_secs(120 * 60));
        assert_eq!(options.health_check_timeout(), Duration::from_secs(45 * 60));
        assert!(options.working_dir().ends_with("rosaflow/demo"));
    }

    #[test]
    fn test_hosted_cp_implies_sts_and_shorter_timeouts() {
        let options = CreateClusterOptions {
            hosted_cp: true,
            install_timeout: Some(Duration::from_secs(60)),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();

        assert!(options.sts);
        assert_eq!(options.install_timeout(), Duration::from_secs(60));
        assert_eq!(options.health_check_timeout(), Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_multi_az_raises_replicas_to_three() {
        let options = CreateClusterOptions {
            multi_az: true,
            replicas: 1,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert_eq!(options.replicas, 3);

        let options = CreateClusterOptions {
            multi_az: true,
            replicas: 5,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert_eq!(options.replicas, 5);
    }

    #[test]
    fn test_replica_bounds_take_precedence() {
        let options = CreateClusterOptions {
            min_replicas: 2,
            max_replicas: 6,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert!(options.uses_replica_bounds());
    }

    #[test]
    fn test_blank_identifiers_are_treated_as_unset() {
        let options = CreateClusterOptions {
            oidc_config_id: Some("  ".to_string()),
            subnet_ids: Some(String::new()),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert_eq!(options.oidc_config_id, None);
        assert_eq!(options.subnet_ids, None);
    }

    #[test]
    fn test_private_link_forces_machine_cidr() {
        let options = CreateClusterOptions {
            private_link: true,
            machine_cidr: Some("192.168.0.0/16".to_string()),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert_eq!(options.machine_cidr(), "10.0.0.0/16");
    }

    #[test]
    fn test_delete_defaults_for_hosted_cluster() {
        let options = DeleteClusterOptions {
            hosted_cp: true,
            ..DeleteClusterOptions::new("demo")
        }
        .with_defaults();

        assert!(options.sts);
        assert!(options.delete_network_stack);
        assert_eq!(options.uninstall_timeout(), Duration::from_secs(30 * 60));
        assert_eq!(
            options.working_dir(),
            CreateClusterOptions::new("demo", "4.14.3").with_defaults().working_dir()
        );
    }

    #[test]
    fn test_create_options_deserialize_with_defaults() {
        let options: CreateClusterOptions =
            serde_json::from_str(r#"{"cluster_name": "demo", "version": "4.14.3", "hosted_cp": true}"#)
                .unwrap();
        assert_eq!(options.cluster_name, "demo");
        assert!(options.hosted_cp);
        assert_eq!(options.replicas, 0);
    }
}
