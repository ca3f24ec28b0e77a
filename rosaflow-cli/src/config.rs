use std::time::Duration;

use anyhow::{Context, Result};
use rosaflow_models::OcmEnvironment;
use rosaflow_orchestrations::credentials::{AwsCredentials, OcmCredentials};
use rosaflow_orchestrations::wait::DEFAULT_POLL_INTERVAL;
use rosaflow_orchestrations::ProviderConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub aws: AwsCredentials,
    pub ocm: OcmCredentials,
    pub environment: OcmEnvironment,
    pub rosa_binary: String,
    pub terraform_binary: String,
    pub poll_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            aws: AwsCredentials::from_env(),
            ocm: OcmCredentials::from_env().context("OCM credentials are not set")?,
            environment: std::env::var("OCM_ENV")
                .unwrap_or_else(|_| "stage".to_string())
                .parse()
                .context("OCM_ENV must name a known environment")?,
            rosa_binary: std::env::var("ROSA_BINARY").unwrap_or_else(|_| "rosa".to_string()),
            terraform_binary: std::env::var("TERRAFORM_BINARY")
                .unwrap_or_else(|_| "terraform".to_string()),
            poll_interval: match std::env::var("ROSAFLOW_POLL_INTERVAL_SECS") {
                Ok(secs) => Duration::from_secs(
                    secs.parse()
                        .context("ROSAFLOW_POLL_INTERVAL_SECS must be a number of seconds")?,
                ),
                Err(_) => DEFAULT_POLL_INTERVAL,
            },
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            rosa_binary: self.rosa_binary.clone(),
            terraform_binary: self.terraform_binary.clone(),
            poll_interval: self.poll_interval,
            ..ProviderConfig::new(self.aws.clone(), self.ocm.clone(), self.environment)
        }
    }
}
