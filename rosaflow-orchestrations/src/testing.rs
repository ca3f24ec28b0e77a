//! In-memory collaborators for tests

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rosaflow_models::{ClusterRecord, OcmEnvironment, OidcConfig, Partition, Region, Version};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{
    CommandOutput, CommandRunner, CommandSpec, HealthCheckRequest, HealthChecker, InfraExecutor,
    InfraVars, KubeconfigProvider, ResourceManager,
};
use crate::error::{CommandError, HealthError, RemoteError};
use crate::provider::{Provider, ProviderSettings};
use crate::rosa_cli::RosaCli;

// ============================================================================
// Command runner
// ============================================================================

#[derive(Clone)]
enum Reply {
    Stdout(String),
    Stderr(String),
    /// Never answers; the caller has to be cancelled
    Hang,
}

pub struct Rule {
    prefix: String,
    outputs: VecDeque<Reply>,
}

/// Scripted command runner. Responses are matched by argument prefix; a rule
/// with several responses hands them out in order and repeats the last one.
/// Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    pub rules: Mutex<Vec<Rule>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.push(prefix, Reply::Stdout(stdout.to_string()))
    }

    pub fn fail(self, prefix: &str, stderr: &str) -> Self {
        self.push(prefix, Reply::Stderr(stderr.to_string()))
    }

    pub fn hang(self, prefix: &str) -> Self {
        self.push(prefix, Reply::Hang)
    }

    fn push(self, prefix: &str, output: Reply) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|rule| rule.prefix == prefix) {
                Some(rule) => rule.outputs.push_back(output),
                None => rules.push(Rule {
                    prefix: prefix.to_string(),
                    outputs: VecDeque::from([output]),
                }),
            }
        }
        self
    }

    /// Arguments of every command run so far, space separated
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let line = command.args.join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let output = self
            .rules
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|rule| line.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
            .map(|rule| {
                if rule.outputs.len() > 1 {
                    rule.outputs.pop_front().unwrap()
                } else {
                    rule.outputs[0].clone()
                }
            })
            .unwrap_or_else(|| Reply::Stdout(String::new()));

        match output {
            Reply::Hang => std::future::pending().await,
            Reply::Stdout(stdout) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            }),
            Reply::Stderr(stderr) => Err(CommandError::Failed {
                command: format!("{} {}", command.program, line),
                status: "exit status: 1".to_string(),
                stderr,
            }),
        }
    }
}

// ============================================================================
// Cluster manager
// ============================================================================

/// Lookups answer from a queue of cluster snapshots; the last one repeats.
#[derive(Default)]
pub struct FakeResources {
    pub regions: Vec<Region>,
    pub versions: Vec<Version>,
    pub oidc_configs: Mutex<Vec<OidcConfig>>,
    pub clusters: Mutex<VecDeque<Option<ClusterRecord>>>,
    pub lookups: Mutex<usize>,
}

impl FakeResources {
    pub fn new() -> Self {
        Self {
            regions: vec![region("us-east-1", true), region("eu-west-1", true), region("ap-east-1", false)],
            ..Default::default()
        }
    }

    pub fn with_versions(mut self, raw_ids: &[&str]) -> Self {
        self.versions = raw_ids.iter().map(|raw| version(raw)).collect();
        self
    }

    pub fn with_clusters(self, snapshots: Vec<Option<ClusterRecord>>) -> Self {
        *self.clusters.lock().unwrap() = snapshots.into();
        self
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

pub fn region(id: &str, enabled: bool) -> Region {
    Region {
        id: id.to_string(),
        display_name: id.to_string(),
        enabled,
        supports_hypershift: true,
        supports_multi_az: true,
        ..Default::default()
    }
}

pub fn version(raw_id: &str) -> Version {
    Version {
        id: format!("openshift-v{}", raw_id),
        raw_id: raw_id.to_string(),
        channel_group: "stable".to_string(),
        enabled: true,
        rosa_enabled: true,
        hosted_control_plane_enabled: true,
        ..Default::default()
    }
}

#[async_trait]
impl ResourceManager for FakeResources {
    async fn regions(&self, hosted_cp: bool, multi_az: bool) -> Result<Vec<Region>, RemoteError> {
        Ok(self
            .regions
            .iter()
            .filter(|r| (!hosted_cp || r.supports_hypershift) && (!multi_az || r.supports_multi_az))
            .cloned()
            .collect())
    }

    async fn versions(&self, _channel_group: &str, _hosted_cp: bool) -> Result<Vec<Version>, RemoteError> {
        Ok(self.versions.clone())
    }

    async fn oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError> {
        Ok(self.oidc_configs.lock().unwrap().clone())
    }

    async fn find_cluster(&self, _name_or_id: &str) -> Result<Option<ClusterRecord>, RemoteError> {
        *self.lookups.lock().unwrap() += 1;
        let mut clusters = self.clusters.lock().unwrap();
        Ok(if clusters.len() > 1 {
            clusters.pop_front().flatten()
        } else {
            clusters.front().cloned().flatten()
        })
    }
}

#[async_trait]
impl KubeconfigProvider for FakeResources {
    async fn kubeconfig_file(&self, cluster_id: &str, dir: &Path) -> Result<PathBuf, RemoteError> {
        Ok(dir.join(format!("{}-kubeconfig", cluster_id)))
    }
}

// ============================================================================
// Infrastructure
// ============================================================================

#[derive(Default)]
pub struct FakeInfra {
    pub outputs: BTreeMap<String, serde_json::Value>,
    /// Step that fails, e.g. "apply"
    pub failing_step: Option<&'static str>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeInfra {
    pub fn with_subnets() -> Self {
        let outputs = [
            ("cluster-private-subnet", "\"subnet-priv\""),
            ("cluster-public-subnet", "\"subnet-pub\""),
            ("node-private-subnet", "\"subnet-node\""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
        Self {
            outputs,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, step: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == step).count()
    }

    fn record(&self, step: &'static str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(step.to_string());
        if self.failing_step == Some(step) {
            return Err(RemoteError::from(CommandError::Failed {
                command: format!("terraform {}", step),
                status: "exit status: 1".to_string(),
                stderr: format!("{} failed", step),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl InfraExecutor for FakeInfra {
    async fn init(&self, _dir: &Path) -> Result<(), RemoteError> {
        self.record("init")
    }

    async fn plan(&self, _dir: &Path, _vars: &InfraVars) -> Result<(), RemoteError> {
        self.record("plan")
    }

    /// Writes a state file like terraform does, even when the step fails
    async fn apply(&self, dir: &Path) -> Result<(), RemoteError> {
        std::fs::write(dir.join(crate::activities::network_stack::STATE_FILE), "{}").unwrap();
        self.record("apply")
    }

    async fn destroy(&self, _dir: &Path, _vars: &InfraVars) -> Result<(), RemoteError> {
        self.record("destroy")
    }

    async fn output(&self, _dir: &Path) -> Result<BTreeMap<String, serde_json::Value>, RemoteError> {
        self.record("output")?;
        Ok(self.outputs.clone())
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Default)]
pub struct FakeHealth {
    pub unhealthy: bool,
    pub checks: Mutex<Vec<HealthCheckRequest>>,
}

impl FakeHealth {
    pub fn checks(&self) -> Vec<HealthCheckRequest> {
        self.checks.lock().unwrap().clone()
    }
}

#[async_trait]
impl HealthChecker for FakeHealth {
    async fn cluster_healthy(
        &self,
        _kubeconfig: &Path,
        request: &HealthCheckRequest,
        _cancel: &CancellationToken,
    ) -> Result<(), HealthError> {
        self.checks.lock().unwrap().push(request.clone());
        if self.unhealthy {
            return Err(HealthError::JobFailed {
                job: "osd-cluster-ready".to_string(),
                log_path: None,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Provider
// ============================================================================

pub struct Fakes {
    pub runner: Arc<FakeRunner>,
    pub resources: Arc<FakeResources>,
    pub infra: Arc<FakeInfra>,
    pub health: Arc<FakeHealth>,
}

impl Fakes {
    pub fn new(runner: FakeRunner, resources: FakeResources, infra: FakeInfra) -> Self {
        Self {
            runner: Arc::new(runner),
            resources: Arc::new(resources),
            infra: Arc::new(infra),
            health: Arc::new(FakeHealth::default()),
        }
    }

    pub fn provider(&self) -> Provider {
        Provider::new(
            RosaCli::new(self.runner.clone(), "rosa"),
            self.resources.clone(),
            self.infra.clone(),
            self.health.clone(),
            self.resources.clone(),
            ProviderSettings {
                region: "us-east-1".to_string(),
                partition: Partition::Standard,
                environment: OcmEnvironment::Stage,
                poll_interval: Duration::from_secs(30),
            },
        )
    }
}
