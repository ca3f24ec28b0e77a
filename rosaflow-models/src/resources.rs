//! Value objects produced by the provisioning steps

use serde::{Deserialize, Serialize};

/// Marker carried by the names of hosted control plane account roles
const HOSTED_ROLE_NAME_MARKER: &str = "HCP-ROSA";

/// The slot an account role fills
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AccountRoleKind {
    ControlPlane,
    Installer,
    Support,
    Worker,
    HostedInstaller,
    HostedSupport,
    HostedWorker,
}

impl AccountRoleKind {
    /// Classify a role by its role type label and name.
    ///
    /// Hosted control plane variants share the label of their classic
    /// counterpart and are told apart by the name marker.
    pub fn classify(role_type: &str, role_name: &str) -> Option<Self> {
        let hosted = role_name.contains(HOSTED_ROLE_NAME_MARKER);
        match (role_type, hosted) {
            ("Control plane", false) => Some(Self::ControlPlane),
            ("Installer", false) => Some(Self::Installer),
            ("Support", false) => Some(Self::Support),
            ("Worker", false) => Some(Self::Worker),
            ("Installer", true) => Some(Self::HostedInstaller),
            ("Support", true) => Some(Self::HostedSupport),
            ("Worker", true) => Some(Self::HostedWorker),
            _ => None,
        }
    }

    pub fn is_hosted(&self) -> bool {
        matches!(
            self,
            Self::HostedInstaller | Self::HostedSupport | Self::HostedWorker
        )
    }
}

/// Account role ARNs for one prefix/version pair
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRoles {
    pub control_plane: Option<String>,
    pub installer: Option<String>,
    pub support: Option<String>,
    pub worker: Option<String>,
    pub hosted_installer: Option<String>,
    pub hosted_support: Option<String>,
    pub hosted_worker: Option<String>,
}

impl AccountRoles {
    pub fn slot_mut(&mut self, kind: AccountRoleKind) -> &mut Option<String> {
        match kind {
            AccountRoleKind::ControlPlane => &mut self.control_plane,
            AccountRoleKind::Installer => &mut self.installer,
            AccountRoleKind::Support => &mut self.support,
            AccountRoleKind::Worker => &mut self.worker,
            AccountRoleKind::HostedInstaller => &mut self.hosted_installer,
            AccountRoleKind::HostedSupport => &mut self.hosted_support,
            AccountRoleKind::HostedWorker => &mut self.hosted_worker,
        }
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        [
            &self.control_plane,
            &self.installer,
            &self.support,
            &self.worker,
            &self.hosted_installer,
            &self.hosted_support,
            &self.hosted_worker,
        ]
        .iter()
        .filter(|slot| slot.is_some())
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_hosted_roles(&self) -> bool {
        self.hosted_installer.is_some() || self.hosted_support.is_some() || self.hosted_worker.is_some()
    }
}

/// Subnets of a provisioned VPC. Multi-AZ stacks carry comma separated ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkStack {
    pub private_subnet: String,
    pub public_subnet: String,
    /// Compute node subnet, hosted control plane only. Reported for
    /// reference; the cluster is created with `subnet_ids` alone.
    pub node_private_subnet: Option<String>,
}

impl NetworkStack {
    /// Value for `--subnet-ids`
    pub fn subnet_ids(&self) -> String {
        format!("{},{}", self.private_subnet, self.public_subnet)
    }
}
