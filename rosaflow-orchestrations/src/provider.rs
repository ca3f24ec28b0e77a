//! The provider: collaborators plus the settings shared by every saga run

use std::sync::Arc;
use std::time::Duration;

use rosaflow_models::{OcmEnvironment, Partition};
use thiserror::Error;
use tracing::{info, info_span, Span};

use crate::collaborators::{HealthChecker, InfraExecutor, KubeconfigProvider, ResourceManager};
use crate::credentials::{AwsCredentials, CredentialsError, OcmCredentials};
use crate::error::{RegionError, RemoteError};
use crate::k8s_client::KubeHealthChecker;
use crate::ocm_client::OcmClient;
use crate::rosa_cli::{ocm_config_path, ProcessRunner, RosaCli};
use crate::terraform::TerraformExecutor;
use crate::activities::regions;
use crate::wait::DEFAULT_POLL_INTERVAL;

/// Region value that asks for a random enabled region
pub const RANDOM_REGION: &str = "random";

/// Settings fixed for the provider's lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub region: String,
    pub partition: Partition,
    pub environment: OcmEnvironment,
    pub poll_interval: Duration,
}

/// What [`Provider::connect`] needs
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub aws: AwsCredentials,
    pub ocm: OcmCredentials,
    pub environment: OcmEnvironment,
    pub rosa_binary: String,
    pub terraform_binary: String,
    pub poll_interval: Duration,
}

impl ProviderConfig {
    pub fn new(aws: AwsCredentials, ocm: OcmCredentials, environment: OcmEnvironment) -> Self {
        Self {
            aws,
            ocm,
            environment,
            rosa_binary: "rosa".to_string(),
            terraform_binary: "terraform".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("failed to resolve the aws region: {0}")]
    Region(#[from] RegionError),

    #[error("failed to log in to the cluster manager: {0}")]
    Remote(#[from] RemoteError),
}

/// Collaborators and settings for one OCM environment and AWS account.
/// Sagas borrow it; several sagas may share one provider.
pub struct Provider {
    rosa: RosaCli,
    resources: Arc<dyn ResourceManager>,
    infra: Arc<dyn InfraExecutor>,
    health: Arc<dyn HealthChecker>,
    kubeconfigs: Arc<dyn KubeconfigProvider>,
    settings: ProviderSettings,
    span: Span,
}

impl Provider {
    pub fn new(
        rosa: RosaCli,
        resources: Arc<dyn ResourceManager>,
        infra: Arc<dyn InfraExecutor>,
        health: Arc<dyn HealthChecker>,
        kubeconfigs: Arc<dyn KubeconfigProvider>,
        settings: ProviderSettings,
    ) -> Self {
        let span = info_span!(
            "provider",
            region = %settings.region,
            environment = %settings.environment.cli_name(),
        );
        Self {
            rosa,
            resources,
            infra,
            health,
            kubeconfigs,
            settings,
            span,
        }
    }

    /// Validate credentials, resolve the region and log `rosa` in
    pub async fn connect(config: ProviderConfig) -> Result<Self, ConnectError> {
        let ProviderConfig {
            mut aws,
            ocm,
            environment,
            rosa_binary,
            terraform_binary,
            poll_interval,
        } = config;
        aws.validate()?;

        let ocm_client = Arc::new(OcmClient::new(environment, ocm.clone())?);

        let requested = aws.region.clone().unwrap_or_default();
        let region = if requested == RANDOM_REGION {
            regions::select_random_region(ocm_client.as_ref()).await?
        } else {
            requested
        };
        aws.region = Some(region.clone());
        let partition = Partition::for_region(&region);

        let runner = Arc::new(
            ProcessRunner::new(Arc::new(aws))
                .env("AWS_REGION", region.as_str())
                .env("OCM_CONFIG", ocm_config_path().to_string_lossy()),
        );
        let rosa = RosaCli::new(runner.clone(), rosa_binary);
        rosa.login(&ocm, environment, &region).await?;
        info!(region = %region, partition = ?partition, environment = %environment.cli_name(), "Logged in to the cluster manager");

        Ok(Self::new(
            rosa,
            ocm_client.clone(),
            Arc::new(TerraformExecutor::new(runner, terraform_binary)),
            Arc::new(KubeHealthChecker),
            ocm_client,
            ProviderSettings {
                region,
                partition,
                environment,
                poll_interval,
            },
        ))
    }

    pub fn rosa(&self) -> &RosaCli {
        &self.rosa
    }

    pub fn resources(&self) -> &dyn ResourceManager {
        self.resources.as_ref()
    }

    pub fn infra(&self) -> &dyn InfraExecutor {
        self.infra.as_ref()
    }

    pub fn health(&self) -> &dyn HealthChecker {
        self.health.as_ref()
    }

    pub fn kubeconfigs(&self) -> &dyn KubeconfigProvider {
        self.kubeconfigs.as_ref()
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn region(&self) -> &str {
        &self.settings.region
    }

    pub fn partition(&self) -> Partition {
        self.settings.partition
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeInfra, FakeResources, FakeRunner, Fakes};

    #[tokio::test]
    async fn test_connect_rejects_missing_aws_credentials() {
        let config = ProviderConfig::new(
            AwsCredentials::default(),
            OcmCredentials::Token("offline".to_string()),
            OcmEnvironment::Stage,
        );

        let err = Provider::connect(config).await.err().unwrap();
        assert!(matches!(err, ConnectError::Credentials(CredentialsError::MissingAws)));
    }

    #[test]
    fn test_provider_exposes_settings() {
        let fakes = Fakes::new(FakeRunner::new(), FakeResources::new(), FakeInfra::default());
        let provider = fakes.provider();

        assert_eq!(provider.region(), "us-east-1");
        assert_eq!(provider.partition(), Partition::Standard);
        assert_eq!(provider.settings().poll_interval, Duration::from_secs(30));
        assert_eq!(provider.rosa().binary(), "rosa");
    }
}
