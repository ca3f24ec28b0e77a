//! Boundaries to the systems the orchestrations drive
//!
//! Each trait has one concrete implementation in this crate and an in-memory
//! fake under `testing` for the saga tests.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rosaflow_models::{ClusterRecord, OidcConfig, Region, Version};
use tokio_util::sync::CancellationToken;

use crate::error::{CommandError, HealthError, RemoteError};

// ============================================================================
// External commands
// ============================================================================

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools to completion and captures their output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// A non-zero exit status is reported as [`CommandError::Failed`]
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Supplies the environment variables that authenticate external tools
pub trait CredentialSource: Send + Sync {
    fn env_vars(&self) -> Vec<(String, String)>;
}

// ============================================================================
// Cluster manager read API
// ============================================================================

#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Provider regions, keeping only those with the requested capabilities
    async fn regions(&self, hosted_cp: bool, multi_az: bool) -> Result<Vec<Region>, RemoteError>;

    /// Enabled versions of a channel group
    async fn versions(&self, channel_group: &str, hosted_cp: bool) -> Result<Vec<Version>, RemoteError>;

    async fn oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError>;

    /// Look a cluster up by name or id. `None` once the cluster is gone.
    async fn find_cluster(&self, name_or_id: &str) -> Result<Option<ClusterRecord>, RemoteError>;
}

/// Writes a cluster's admin kubeconfig to disk
#[async_trait]
pub trait KubeconfigProvider: Send + Sync {
    async fn kubeconfig_file(&self, cluster_id: &str, dir: &Path) -> Result<PathBuf, RemoteError>;
}

// ============================================================================
// Declarative infrastructure
// ============================================================================

/// Variables passed to plan and destroy
pub type InfraVars = BTreeMap<String, String>;

/// Drives a declarative infrastructure tool inside one working directory.
/// The directory's persisted state is the source of truth between calls.
#[async_trait]
pub trait InfraExecutor: Send + Sync {
    async fn init(&self, dir: &Path) -> Result<(), RemoteError>;

    async fn plan(&self, dir: &Path, vars: &InfraVars) -> Result<(), RemoteError>;

    async fn apply(&self, dir: &Path) -> Result<(), RemoteError>;

    async fn destroy(&self, dir: &Path, vars: &InfraVars) -> Result<(), RemoteError>;

    /// Output values keyed by output name
    async fn output(&self, dir: &Path) -> Result<BTreeMap<String, serde_json::Value>, RemoteError>;
}

// ============================================================================
// Health checks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HealthTopology {
    /// All nodes Ready and at least this many of them
    HostedControlPlane { expected_compute_nodes: u32 },
    /// The readiness job succeeded; its log lands in `report_dir` on failure
    Classic { report_dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckRequest {
    pub topology: HealthTopology,
    pub timeout: Duration,
    pub interval: Duration,
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn cluster_healthy(
        &self,
        kubeconfig: &Path,
        request: &HealthCheckRequest,
        cancel: &CancellationToken,
    ) -> Result<(), HealthError>;
}
