//! Records reported by the cluster manager API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Installation state of a cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    Validating,
    Waiting,
    Pending,
    Installing,
    Ready,
    Error,
    Hibernating,
    Uninstalling,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ClusterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Waiting => "waiting",
            Self::Pending => "pending",
            Self::Installing => "installing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Hibernating => "hibernating",
            Self::Uninstalling => "uninstalling",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live cluster as seen by the cluster manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClusterRecord {
    pub id: String,
    pub name: String,
    pub state: ClusterState,
    pub hosted_cp: bool,
    pub region: Option<String>,
    /// Requested compute node count
    pub compute_nodes: u32,
    /// Installer account role the cluster was created with
    pub role_arn: Option<String>,
    pub operator_role_prefix: Option<String>,
    pub oidc_config_id: Option<String>,
}

/// Cloud provider region and its capabilities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Region {
    pub id: String,
    pub display_name: String,
    pub enabled: bool,
    pub ccs_only: bool,
    pub supports_hypershift: bool,
    pub supports_multi_az: bool,
}

/// Installable OpenShift version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Version {
    /// Prefixed id, e.g. "openshift-v4.14.3"
    pub id: String,
    /// Semantic version, e.g. "4.14.3"
    pub raw_id: String,
    pub channel_group: String,
    pub enabled: bool,
    pub rosa_enabled: bool,
    pub hosted_control_plane_enabled: bool,
    pub default: bool,
    pub available_upgrades: Vec<String>,
    pub end_of_life_timestamp: Option<DateTime<Utc>>,
}

/// OIDC identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OidcConfig {
    pub id: String,
    /// Secret reference; carries the role prefix the config was created for
    pub secret_arn: String,
    pub issuer_url: String,
    pub managed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_cluster_state_is_tolerated() {
        let state: ClusterState = serde_json::from_str(r#""powering_down""#).unwrap();
        assert_eq!(state, ClusterState::Unknown);

        let state: ClusterState = serde_json::from_str(r#""ready""#).unwrap();
        assert_eq!(state, ClusterState::Ready);
    }

    #[test]
    fn test_version_deserializes_from_api_shape() {
        let version: Version = serde_json::from_str(
            r#"{
                "kind": "Version",
                "id": "openshift-v4.14.3",
                "raw_id": "4.14.3",
                "channel_group": "stable",
                "enabled": true,
                "rosa_enabled": true,
                "end_of_life_timestamp": "2025-05-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(version.raw_id, "4.14.3");
        assert!(version.rosa_enabled);
        assert!(!version.hosted_control_plane_enabled);
        assert!(version.end_of_life_timestamp.is_some());
    }
}
