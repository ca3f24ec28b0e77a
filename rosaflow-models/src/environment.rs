use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cluster manager (OCM) environment the provider talks to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum OcmEnvironment {
    Production,
    Stage,
    Integration,
    FedRampProduction,
    FedRampStage,
    FedRampIntegration,
}

impl OcmEnvironment {
    /// API endpoint for the environment
    pub fn url(&self) -> &'static str {
        match self {
            Self::Production => "https://api.openshift.com",
            Self::Stage => "https://api.stage.openshift.com",
            Self::Integration => "https://api.integration.openshift.com",
            Self::FedRampProduction => "https://api.openshiftusgov.com",
            Self::FedRampStage => "https://api.stage.openshiftusgov.com",
            Self::FedRampIntegration => "https://api.int.openshiftusgov.com",
        }
    }

    /// SSO token endpoint used to exchange credentials for an access token
    pub fn token_url(&self) -> &'static str {
        if self.is_restricted() {
            "https://sso.int.openshiftusgov.com/realms/redhat-external/protocol/openid-connect/token"
        } else {
            "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token"
        }
    }

    /// Short name understood by `rosa login --env`
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Production | Self::FedRampProduction => "production",
            Self::Stage | Self::FedRampStage => "staging",
            Self::Integration | Self::FedRampIntegration => "integration",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production | Self::FedRampProduction)
    }

    pub fn is_restricted(&self) -> bool {
        matches!(
            self,
            Self::FedRampProduction | Self::FedRampStage | Self::FedRampIntegration
        )
    }
}

impl fmt::Display for OcmEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnvironment(pub String);

impl fmt::Display for UnknownEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown ocm environment {:?}", self.0)
    }
}

impl std::error::Error for UnknownEnvironment {}

impl FromStr for OcmEnvironment {
    type Err = UnknownEnvironment;

    /// Accepts either the short name (`stage`) or the API url
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            Self::Production,
            Self::Stage,
            Self::Integration,
            Self::FedRampProduction,
            Self::FedRampStage,
            Self::FedRampIntegration,
        ];
        let wanted = s.trim().trim_end_matches('/').to_ascii_lowercase();

        match wanted.as_str() {
            "production" | "prod" => return Ok(Self::Production),
            "stage" | "staging" => return Ok(Self::Stage),
            "integration" | "int" => return Ok(Self::Integration),
            "fedramp-production" => return Ok(Self::FedRampProduction),
            "fedramp-stage" => return Ok(Self::FedRampStage),
            "fedramp-integration" => return Ok(Self::FedRampIntegration),
            _ => {}
        }

        all.into_iter()
            .find(|env| env.url() == wanted)
            .ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}

/// Cloud account class. Restricted accounts (government regions) get fewer
/// account roles and a managed OIDC config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    #[default]
    Standard,
    Restricted,
}

impl Partition {
    pub fn for_region(region: &str) -> Self {
        if region.contains("gov") {
            Self::Restricted
        } else {
            Self::Standard
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parses_names_and_urls() {
        assert_eq!("stage".parse::<OcmEnvironment>().unwrap(), OcmEnvironment::Stage);
        assert_eq!(
            "https://api.int.openshiftusgov.com/".parse::<OcmEnvironment>().unwrap(),
            OcmEnvironment::FedRampIntegration
        );
        assert!("nowhere".parse::<OcmEnvironment>().is_err());
    }

    #[test]
    fn test_partition_from_region() {
        assert_eq!(Partition::for_region("us-gov-west-1"), Partition::Restricted);
        assert_eq!(Partition::for_region("us-east-1"), Partition::Standard);
    }
}
