//! Cluster create/delete calls, state polling and install logs
//!
//! The `rosa create cluster` command line is produced from [`CREATE_RULES`],
//! one `(flag, rule)` pair per flag. Rules read the defaulted options plus the
//! resources resolved earlier in the saga.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rosaflow_models::{AccountRoles, ClusterState, DefaultedCreateOptions};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collaborators::ResourceManager;
use crate::error::{ClusterStateError, PhaseError, RemoteError};
use crate::rosa_cli::RosaCli;
use crate::wait::{wait_for, WaitError, WaitOptions};

/// Network type that needs no flag
const DEFAULT_NETWORK_TYPE: &str = "OVNKubernetes";

// ============================================================================
// Create call arguments
// ============================================================================

/// Inputs of the create call
#[derive(Debug, Clone)]
pub struct CreateArgs<'a> {
    pub options: &'a DefaultedCreateOptions,
    pub region: &'a str,
    pub roles: &'a AccountRoles,
    pub oidc_config_id: Option<&'a str>,
    pub subnet_ids: Option<&'a str>,
    pub billing_account_id: Option<&'a str>,
    /// Absent in production
    pub expiration_time: Option<DateTime<Utc>>,
}

/// What a rule contributes to the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Skip,
    /// The bare flag
    Switch,
    /// The flag followed by one value
    Value(String),
    /// The flag repeated once per value
    Repeated(Vec<String>),
}

impl Arg {
    fn value(value: impl ToString) -> Self {
        Self::Value(value.to_string())
    }

    fn value_if(condition: bool, value: impl ToString) -> Self {
        if condition {
            Self::value(value)
        } else {
            Self::Skip
        }
    }

    fn optional(value: Option<&str>) -> Self {
        value.map_or(Self::Skip, Self::value)
    }

    fn switch_if(condition: bool) -> Self {
        if condition {
            Self::Switch
        } else {
            Self::Skip
        }
    }
}

pub type ArgRule = fn(&CreateArgs<'_>) -> Arg;

impl CreateArgs<'_> {
    fn uses_roles(&self) -> bool {
        self.options.hosted_cp || self.options.sts
    }

    /// Installer, support and worker roles come from the hosted set for hosted clusters
    fn role(&self, hosted: &Option<String>, classic: &Option<String>) -> Arg {
        if self.options.hosted_cp {
            Arg::optional(hosted.as_deref())
        } else if self.options.sts {
            Arg::optional(classic.as_deref())
        } else {
            Arg::Skip
        }
    }

    fn proxy(&self, value: &Option<String>) -> Arg {
        if self.subnet_ids.is_some() {
            Arg::optional(value.as_deref())
        } else {
            Arg::Skip
        }
    }
}

pub const CREATE_RULES: &[(&str, ArgRule)] = &[
    ("--output", |_| Arg::value("json")),
    ("--cluster-name", |a| Arg::value(&a.options.cluster_name)),
    ("--channel-group", |a| Arg::value(a.options.channel_group())),
    ("--compute-machine-type", |a| Arg::value(a.options.compute_machine_type())),
    ("--machine-cidr", |a| Arg::value(a.options.machine_cidr())),
    ("--region", |a| Arg::value(a.region)),
    ("--version", |a| Arg::value(&a.options.version)),
    ("--host-prefix", |a| Arg::value_if(a.options.host_prefix > 0, a.options.host_prefix)),
    ("--oidc-config-id", |a| Arg::optional(a.oidc_config_id)),
    ("--role-arn", |a| a.role(&a.roles.hosted_installer, &a.roles.installer)),
    ("--controlplane-iam-role", |a| {
        Arg::optional(a.roles.control_plane.as_deref().filter(|_| a.options.sts && !a.options.hosted_cp))
    }),
    ("--support-role-arn", |a| a.role(&a.roles.hosted_support, &a.roles.support)),
    ("--worker-iam-role", |a| a.role(&a.roles.hosted_worker, &a.roles.worker)),
    ("--mode", |a| Arg::value_if(a.uses_roles(), "auto")),
    ("--hosted-cp", |a| Arg::switch_if(a.options.hosted_cp)),
    ("--billing-account", |a| Arg::optional(a.billing_account_id.filter(|_| a.options.hosted_cp))),
    ("--subnet-ids", |a| Arg::optional(a.subnet_ids)),
    ("--pod-cidr", |a| Arg::optional(a.options.pod_cidr.as_deref())),
    ("--service-cidr", |a| Arg::optional(a.options.service_cidr.as_deref())),
    ("--sts", |a| Arg::switch_if(a.options.sts)),
    ("--mint-mode", |a| Arg::switch_if(a.options.mint_mode)),
    ("--private-link", |a| Arg::switch_if(a.options.private_link)),
    ("--fips", |a| Arg::switch_if(a.options.fips)),
    ("--network-type", |a| {
        Arg::optional(
            a.options
                .network_type
                .as_deref()
                .filter(|t| !t.is_empty() && *t != DEFAULT_NETWORK_TYPE),
        )
    }),
    ("--multi-az", |a| Arg::switch_if(a.options.multi_az)),
    ("--enable-autoscaling", |a| Arg::switch_if(a.options.enable_autoscaling)),
    ("--etcd-encryption", |a| Arg::switch_if(a.options.etcd_encryption)),
    ("--min-replicas", |a| Arg::value_if(a.options.min_replicas > 0, a.options.min_replicas)),
    ("--max-replicas", |a| Arg::value_if(a.options.max_replicas > 0, a.options.max_replicas)),
    ("--replicas", |a| Arg::value_if(!a.options.uses_replica_bounds(), a.options.replicas)),
    ("--http-proxy", |a| a.proxy(&a.options.http_proxy)),
    ("--https-proxy", |a| a.proxy(&a.options.https_proxy)),
    ("--no-proxy", |a| a.proxy(&a.options.no_proxy)),
    ("--additional-trust-bundle-file", |a| a.proxy(&a.options.additional_trust_bundle_file)),
    ("--properties", |a| {
        Arg::Repeated(
            a.options
                .properties
                .iter()
                .map(|(key, value)| format!("{}:{}", key, value))
                .collect(),
        )
    }),
    ("--expiration-time", |a| {
        a.expiration_time
            .map_or(Arg::Skip, |t| Arg::value(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }),
    ("--yes", |_| Arg::Switch),
];

/// Full argument list of the create call
pub fn create_args(args: &CreateArgs<'_>) -> Vec<String> {
    let mut line = vec!["create".to_string(), "cluster".to_string()];
    for (flag, rule) in CREATE_RULES {
        match rule(args) {
            Arg::Skip => {}
            Arg::Switch => line.push(flag.to_string()),
            Arg::Value(value) => line.extend([flag.to_string(), value]),
            Arg::Repeated(values) => {
                for value in values {
                    line.extend([flag.to_string(), value]);
                }
            }
        }
    }
    line
}

// ============================================================================
// Calls
// ============================================================================

/// Issue the create call and return the new cluster's id
pub async fn create(
    rosa: &RosaCli,
    resources: &dyn ResourceManager,
    args: &CreateArgs<'_>,
) -> Result<String, PhaseError> {
    let cluster_name = &args.options.cluster_name;
    info!(cluster_name = %cluster_name, region = %args.region, "Initiating cluster creation");

    rosa.run(create_args(args)).await?;

    let cluster = resources
        .find_cluster(cluster_name)
        .await?
        .ok_or_else(|| PhaseError::ClusterNotFound(cluster_name.clone()))?;

    info!(cluster_name = %cluster_name, cluster_id = %cluster.id, "Cluster creation initiated");
    Ok(cluster.id)
}

pub async fn delete(rosa: &RosaCli, cluster_id: &str) -> Result<(), RemoteError> {
    info!(cluster_id = %cluster_id, "Initiating cluster deletion");
    rosa.run(["delete", "cluster", "--cluster", cluster_id, "--yes"]).await?;
    info!(cluster_id = %cluster_id, "Cluster deletion initiated");
    Ok(())
}

/// Wait for the cluster to become ready. An `error` state ends the wait early.
pub async fn wait_for_install(
    resources: &dyn ResourceManager,
    cluster_id: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<(), WaitError<ClusterStateError>> {
    info!(cluster_id = %cluster_id, timeout_secs = options.timeout.as_secs(), "Waiting for cluster to be installed");

    wait_for(&format!("cluster {} ready", cluster_id), options, cancel, || async move {
        let cluster = resources
            .find_cluster(cluster_id)
            .await?
            .ok_or_else(|| ClusterStateError::Vanished(cluster_id.to_string()))?;

        match cluster.state {
            ClusterState::Ready => {
                info!(cluster_id = %cluster_id, "Cluster is ready");
                Ok::<_, ClusterStateError>(true)
            }
            ClusterState::Error => Err(ClusterStateError::Failed {
                cluster_id: cluster_id.to_string(),
                state: cluster.state,
            }),
            state => {
                info!(cluster_id = %cluster_id, state = %state, "Cluster not ready yet");
                Ok(false)
            }
        }
    })
    .await
}

/// Wait until the cluster no longer exists
pub async fn wait_for_uninstall(
    resources: &dyn ResourceManager,
    cluster_id: &str,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<(), WaitError<ClusterStateError>> {
    info!(cluster_id = %cluster_id, timeout_secs = options.timeout.as_secs(), "Waiting for cluster to be deleted");

    wait_for(&format!("cluster {} deleted", cluster_id), options, cancel, || async move {
        match resources.find_cluster(cluster_id).await? {
            Some(cluster) => {
                info!(cluster_id = %cluster_id, state = %cluster.state, "Cluster is uninstalling");
                Ok::<_, ClusterStateError>(false)
            }
            None => {
                info!(cluster_id = %cluster_id, "Cluster no longer exists");
                Ok(true)
            }
        }
    })
    .await
}

/// Save the install log to `<dir>/<cluster name>-install.log`
pub async fn save_install_log(rosa: &RosaCli, cluster_name: &str, dir: &Path) -> Result<PathBuf, RemoteError> {
    let output = rosa.run(["logs", "install", "--cluster", cluster_name]).await?;
    let path = dir.join(format!("{}-install.log", cluster_name));
    tokio::fs::write(&path, output.stdout)
        .await
        .map_err(|source| RemoteError::Io {
            path: path.clone(),
            source,
        })?;
    info!(cluster_name = %cluster_name, path = %path.display(), "Saved install log");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeResources, FakeRunner};
    use rosaflow_models::{ClusterRecord, CreateClusterOptions};
    use std::sync::Arc;
    use std::time::Duration;

    fn roles() -> AccountRoles {
        let arn = |name: &str| Some(format!("arn:aws:iam::1:role/{}", name));
        AccountRoles {
            control_plane: arn("cp"),
            installer: arn("installer"),
            support: arn("support"),
            worker: arn("worker"),
            hosted_installer: arn("hcp-installer"),
            hosted_support: arn("hcp-support"),
            hosted_worker: arn("hcp-worker"),
        }
    }

    fn args<'a>(options: &'a DefaultedCreateOptions, roles: &'a AccountRoles) -> CreateArgs<'a> {
        CreateArgs {
            options,
            region: "us-east-1",
            roles,
            oidc_config_id: None,
            subnet_ids: None,
            billing_account_id: None,
            expiration_time: None,
        }
    }

    fn value_of<'a>(line: &'a [String], flag: &str) -> Option<&'a str> {
        line.iter()
            .position(|arg| arg == flag)
            .and_then(|i| line.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_classic_cluster_arguments() {
        let options = CreateClusterOptions::new("demo", "4.14.3").with_defaults();
        let roles = AccountRoles::default();

        let line = create_args(&args(&options, &roles));
        assert_eq!(
            line.join(" "),
            "create cluster --output json --cluster-name demo --channel-group stable \
             --compute-machine-type m5.xlarge --machine-cidr 10.0.0.0/16 --region us-east-1 \
             --version 4.14.3 --replicas 2 --yes"
        );
    }

    #[test]
    fn test_hosted_cluster_uses_hosted_roles() {
        let options = CreateClusterOptions {
            hosted_cp: true,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = roles();
        let create = CreateArgs {
            oidc_config_id: Some("cfg"),
            subnet_ids: Some("subnet-a,subnet-b"),
            billing_account_id: Some("123456789012"),
            ..args(&options, &roles)
        };

        let line = create_args(&create);
        assert_eq!(value_of(&line, "--role-arn"), Some("arn:aws:iam::1:role/hcp-installer"));
        assert_eq!(value_of(&line, "--worker-iam-role"), Some("arn:aws:iam::1:role/hcp-worker"));
        assert_eq!(value_of(&line, "--controlplane-iam-role"), None);
        assert_eq!(value_of(&line, "--billing-account"), Some("123456789012"));
        assert_eq!(value_of(&line, "--mode"), Some("auto"));
        assert_eq!(value_of(&line, "--oidc-config-id"), Some("cfg"));
        assert!(line.contains(&"--hosted-cp".to_string()));
        assert!(line.contains(&"--sts".to_string()));
    }

    #[test]
    fn test_sts_classic_cluster_uses_classic_roles() {
        let options = CreateClusterOptions {
            sts: true,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = roles();

        let line = create_args(&args(&options, &roles));
        assert_eq!(value_of(&line, "--role-arn"), Some("arn:aws:iam::1:role/installer"));
        assert_eq!(value_of(&line, "--controlplane-iam-role"), Some("arn:aws:iam::1:role/cp"));
        assert_eq!(value_of(&line, "--billing-account"), None);
    }

    #[test]
    fn test_multi_az_raises_replicas() {
        let options = CreateClusterOptions {
            multi_az: true,
            replicas: 1,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = AccountRoles::default();

        let line = create_args(&args(&options, &roles));
        assert_eq!(value_of(&line, "--replicas"), Some("3"));
        assert!(line.contains(&"--multi-az".to_string()));
    }

    #[test]
    fn test_replica_bounds_suppress_flat_replicas() {
        let options = CreateClusterOptions {
            min_replicas: 2,
            max_replicas: 4,
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = AccountRoles::default();

        let line = create_args(&args(&options, &roles));
        assert_eq!(value_of(&line, "--replicas"), None);
        assert_eq!(value_of(&line, "--min-replicas"), Some("2"));
        assert_eq!(value_of(&line, "--max-replicas"), Some("4"));
    }

    #[test]
    fn test_proxy_flags_need_subnets() {
        let options = CreateClusterOptions {
            http_proxy: Some("http://proxy:3128".to_string()),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = AccountRoles::default();

        let without = create_args(&args(&options, &roles));
        assert_eq!(value_of(&without, "--http-proxy"), None);

        let with = create_args(&CreateArgs {
            subnet_ids: Some("subnet-a"),
            ..args(&options, &roles)
        });
        assert_eq!(value_of(&with, "--http-proxy"), Some("http://proxy:3128"));
    }

    #[test]
    fn test_properties_expiration_and_network_type() {
        let options = CreateClusterOptions {
            properties: [("b".to_string(), "2".to_string()), ("a".to_string(), "1".to_string())].into(),
            network_type: Some("OpenShiftSDN".to_string()),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        let roles = AccountRoles::default();
        let expiration = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let line = create_args(&CreateArgs {
            expiration_time: Some(expiration),
            ..args(&options, &roles)
        })
        .join(" ");
        assert!(line.contains("--properties a:1 --properties b:2"));
        assert!(line.contains("--expiration-time 2024-05-01T12:00:00Z"));
        assert!(line.contains("--network-type OpenShiftSDN"));

        let default_network = CreateClusterOptions {
            network_type: Some("OVNKubernetes".to_string()),
            ..CreateClusterOptions::new("demo", "4.14.3")
        }
        .with_defaults();
        assert!(!create_args(&args(&default_network, &roles)).contains(&"--network-type".to_string()));
    }

    fn record(state: ClusterState) -> Option<ClusterRecord> {
        Some(ClusterRecord {
            id: "abc".to_string(),
            name: "demo".to_string(),
            state,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_create_returns_cluster_id() {
        let runner = Arc::new(FakeRunner::new());
        let rosa = RosaCli::new(runner.clone(), "rosa");
        let resources = FakeResources::new().with_clusters(vec![record(ClusterState::Pending)]);
        let options = CreateClusterOptions::new("demo", "4.14.3").with_defaults();
        let roles = AccountRoles::default();

        let id = create(&rosa, &resources, &args(&options, &roles)).await.unwrap();
        assert_eq!(id, "abc");
        assert_eq!(runner.count("create cluster"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_wait_until_ready() {
        let resources = FakeResources::new().with_clusters(vec![
            record(ClusterState::Pending),
            record(ClusterState::Installing),
            record(ClusterState::Ready),
        ]);
        let cancel = CancellationToken::new();

        wait_for_install(&resources, "abc", WaitOptions::new(Duration::from_secs(600)), &cancel)
            .await
            .unwrap();
        assert_eq!(resources.lookups(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_wait_fails_fast_on_error_state() {
        let resources = FakeResources::new().with_clusters(vec![
            record(ClusterState::Installing),
            record(ClusterState::Error),
        ]);
        let cancel = CancellationToken::new();

        let err = wait_for_install(&resources, "abc", WaitOptions::new(Duration::from_secs(600)), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WaitError::Check(ClusterStateError::Failed { state: ClusterState::Error, .. })
        ));
        assert_eq!(resources.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninstall_wait_until_gone() {
        let resources = FakeResources::new().with_clusters(vec![record(ClusterState::Uninstalling), None]);
        let cancel = CancellationToken::new();

        wait_for_uninstall(&resources, "abc", WaitOptions::new(Duration::from_secs(600)), &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_install_log() {
        let dir = assert_fs::TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new().respond("logs install", "installing...\ndone\n"));
        let rosa = RosaCli::new(runner, "rosa");

        let path = save_install_log(&rosa, "demo", dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("demo-install.log"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "installing...\ndone\n");
    }
}
