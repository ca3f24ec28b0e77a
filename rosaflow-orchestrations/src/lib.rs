//! Rosaflow Orchestrations - sagas and activities for ROSA cluster lifecycle
//!
//! This crate provisions and deletes Red Hat OpenShift on AWS clusters together
//! with the account roles, OIDC configuration and network stack they depend on.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rosaflow_models::{CreateClusterOptions, OcmEnvironment};
//! use rosaflow_orchestrations::credentials::{AwsCredentials, OcmCredentials};
//! use rosaflow_orchestrations::provider::{Provider, ProviderConfig};
//! use rosaflow_orchestrations::create_cluster;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProviderConfig::new(
//!     AwsCredentials::from_env(),
//!     OcmCredentials::from_env()?,
//!     OcmEnvironment::Stage,
//! );
//! let provider = Provider::connect(config).await?;
//!
//! let options = CreateClusterOptions::new("demo", "4.14.3").with_defaults();
//! let cluster_id = create_cluster(&provider, &options, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod activities;
pub mod collaborators;
pub mod credentials;
pub mod error;
pub mod k8s_client;
pub mod names;
pub mod ocm_client;
pub mod provider;
pub mod rosa_cli;
pub mod terraform;
pub mod wait;

mod orchestrations;

#[cfg(test)]
mod testing;

pub use error::{ClusterError, ErrorKind, Phase};
pub use orchestrations::{create_cluster, delete_cluster, CreatedResource, CreatedResources};
pub use provider::{Provider, ProviderConfig, ProviderSettings};
