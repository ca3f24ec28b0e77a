//! Error types for activities and orchestrations
//!
//! Activities return their own enum; the sagas wrap whatever surfaces into a
//! [`ClusterError`] that names the action and phase it came from.

use std::fmt;
use std::path::PathBuf;

use rosaflow_models::ClusterState;
use thiserror::Error;

use crate::wait::WaitError;

// ============================================================================
// Collaborator errors
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

impl CommandError {
    /// Captured stderr of a command that ran and failed
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Failed { stderr, .. } => Some(stderr),
            Self::Spawn { .. } => None,
        }
    }
}

/// A call to an external tool or API did not succeed
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{method} {path} returned {status}: {body}")]
    Api {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },

    #[error("request to the cluster manager failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication with the cluster manager failed: {0}")]
    Auth(String),

    #[error("malformed {what} output: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} output has no {field}")]
    MissingField {
        what: &'static str,
        field: &'static str,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub fn malformed(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Malformed { what, source }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Command(e) => e.stderr(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("failed to build a kubernetes client from {path}: {source:#}")]
    Client {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{check} failed: {source}")]
    Wait {
        check: &'static str,
        #[source]
        source: WaitError<kube::Error>,
    },

    #[error("job {job} did not succeed")]
    JobFailed {
        job: String,
        log_path: Option<PathBuf>,
    },
}

// ============================================================================
// Activity errors
// ============================================================================

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("region {region} not found (hosted_cp={hosted_cp}, multi_az={multi_az})")]
    NotFound {
        region: String,
        hosted_cp: bool,
        multi_az: bool,
    },

    #[error("region {0} is disabled")]
    Disabled(String),

    #[error("no enabled region available")]
    NoneEnabled,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid version constraint {constraint:?}: {source}")]
    Constraint {
        constraint: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid version {version:?}: {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("version {version} is not available in channel group {channel_group}")]
    Unavailable { version: String, channel_group: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum AccountRolesError {
    #[error("account roles with prefix {prefix} are incomplete: found {found}, expected {expected}")]
    Incomplete {
        prefix: String,
        found: usize,
        expected: &'static str,
    },

    #[error("account roles require a non-empty prefix")]
    MissingPrefix,

    #[error("account roles with prefix {prefix} version {version} not found after creation")]
    MissingAfterCreate { prefix: String, version: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum OidcConfigError {
    #[error("oidc config requires {0}")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum NetworkStackError {
    #[error("network stack requires {0}")]
    MissingParameter(&'static str),

    #[error("no network template for this topology (hosted_cp and private_link are both unset)")]
    UnsupportedTopology,

    #[error("failed to render network template: {0}")]
    Template(#[from] tera::Error),

    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("terraform {step} failed: {source}")]
    Infra {
        step: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("terraform output has no {0}")]
    MissingOutput(&'static str),

    #[error("no terraform state in {0}, nothing to destroy")]
    MissingState(PathBuf),
}

/// Aggregated input problems, reported together
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid input: {}", .problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    /// `Ok` when there is nothing to report
    pub fn check(problems: Vec<String>) -> Result<(), Self> {
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Self { problems })
        }
    }
}

/// Failure while watching a cluster's state
#[derive(Debug, Error)]
pub enum ClusterStateError {
    #[error("cluster {cluster_id} entered state {state}")]
    Failed {
        cluster_id: String,
        state: ClusterState,
    },

    #[error("cluster {0} disappeared")]
    Vanished(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

// ============================================================================
// Saga errors
// ============================================================================

/// Step of a saga an error surfaced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validation,
    NightlyVersion,
    Region,
    AccountRoles,
    OidcConfig,
    NetworkStack,
    CreateCall,
    InstallWait,
    HealthCheck,
    Lookup,
    DeleteCall,
    UninstallWait,
    OperatorRoles,
    OidcProvider,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NightlyVersion => "nightly-version",
            Self::Region => "region",
            Self::AccountRoles => "account-roles",
            Self::OidcConfig => "oidc-config",
            Self::NetworkStack => "network-stack",
            Self::CreateCall => "create-call",
            Self::InstallWait => "install-wait",
            Self::HealthCheck => "health-check",
            Self::Lookup => "lookup",
            Self::DeleteCall => "delete-call",
            Self::UninstallWait => "uninstall-wait",
            Self::OperatorRoles => "operator-roles",
            Self::OidcProvider => "oidc-provider",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad classification of a saga failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input is unusable
    Validation,
    /// A dependency could not be provisioned
    DependencyResolution,
    /// An external call failed
    RemoteCall,
    /// A wait ran out of time
    PollTimeout,
    /// Remote state contradicts what the saga expects
    InconsistentState,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    AccountRoles(#[from] AccountRolesError),

    #[error(transparent)]
    OidcConfig(#[from] OidcConfigError),

    #[error(transparent)]
    NetworkStack(#[from] NetworkStackError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    ClusterWait(#[from] WaitError<ClusterStateError>),

    #[error(transparent)]
    VersionWait(#[from] WaitError<VersionError>),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("cluster {0} not found")]
    ClusterNotFound(String),

    #[error("cancelled")]
    Cancelled,
}

impl PhaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Region(RegionError::Remote(_)) => ErrorKind::RemoteCall,
            Self::Region(_) => ErrorKind::Validation,
            Self::Version(VersionError::Remote(_)) => ErrorKind::RemoteCall,
            Self::Version(_) => ErrorKind::Validation,
            Self::AccountRoles(AccountRolesError::Incomplete { .. }) => ErrorKind::InconsistentState,
            Self::AccountRoles(AccountRolesError::MissingPrefix) => ErrorKind::Validation,
            Self::AccountRoles(_) | Self::OidcConfig(_) | Self::NetworkStack(_) => {
                ErrorKind::DependencyResolution
            }
            Self::Remote(_) => ErrorKind::RemoteCall,
            Self::ClusterWait(e) => wait_kind(e, |e| match e {
                ClusterStateError::Remote(_) => ErrorKind::RemoteCall,
                _ => ErrorKind::InconsistentState,
            }),
            Self::VersionWait(e) => wait_kind(e, |_| ErrorKind::RemoteCall),
            Self::Health(HealthError::Wait { source, .. }) => wait_kind(source, |_| ErrorKind::RemoteCall),
            Self::Health(HealthError::Client { .. }) => ErrorKind::RemoteCall,
            Self::Health(HealthError::JobFailed { .. }) => ErrorKind::InconsistentState,
            Self::ClusterNotFound(_) => ErrorKind::InconsistentState,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

fn wait_kind<E>(error: &WaitError<E>, check: impl FnOnce(&E) -> ErrorKind) -> ErrorKind {
    match error {
        WaitError::Timeout { .. } => ErrorKind::PollTimeout,
        WaitError::Cancelled { .. } => ErrorKind::Cancelled,
        WaitError::Check(e) => check(e),
    }
}

/// Failure of a create or delete saga
#[derive(Debug, Error)]
#[error("{action} failed during {phase}{}: {source}", cluster_suffix(.cluster_id))]
pub struct ClusterError {
    pub action: &'static str,
    pub phase: Phase,
    /// Set once the cluster object exists
    pub cluster_id: Option<String>,
    #[source]
    pub source: PhaseError,
}

impl ClusterError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

fn cluster_suffix(cluster_id: &Option<String>) -> String {
    cluster_id
        .as_deref()
        .map(|id| format!(" (cluster {})", id))
        .unwrap_or_default()
}
