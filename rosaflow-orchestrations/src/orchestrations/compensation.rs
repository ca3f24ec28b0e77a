//! Teardown of dependencies created by a create saga that failed

use std::path::PathBuf;

use tracing::{info, warn};

use crate::activities::{account_roles, network_stack, oidc_config};
use crate::error::NetworkStackError;
use crate::provider::Provider;

/// A dependency the create saga created itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedResource {
    AccountRoles { prefix: String },
    OidcConfig { id: String },
    NetworkStack {
        cluster_name: String,
        region: String,
        working_dir: PathBuf,
    },
}

impl CreatedResource {
    fn describe(&self) -> String {
        match self {
            Self::AccountRoles { prefix } => format!("account roles {}", prefix),
            Self::OidcConfig { id } => format!("oidc config {}", id),
            Self::NetworkStack { working_dir, .. } => format!("network stack in {}", working_dir.display()),
        }
    }

    async fn tear_down(&self, provider: &Provider) -> Result<(), String> {
        match self {
            Self::AccountRoles { prefix } => account_roles::delete(provider.rosa(), prefix)
                .await
                .map_err(|e| e.to_string()),
            Self::OidcConfig { id } => oidc_config::delete(provider.rosa(), id)
                .await
                .map_err(|e| e.to_string()),
            Self::NetworkStack {
                cluster_name,
                region,
                working_dir,
            } => match network_stack::delete(provider.infra(), cluster_name, region, working_dir).await {
                Err(NetworkStackError::MissingState(_)) => {
                    info!(working_dir = %working_dir.display(), "Network stack was never applied, nothing to destroy");
                    Ok(())
                }
                other => other.map_err(|e| e.to_string()),
            },
        }
    }
}

/// Created dependencies in creation order
#[derive(Debug, Default)]
pub struct CreatedResources {
    items: Vec<CreatedResource>,
}

impl CreatedResources {
    pub fn push(&mut self, resource: CreatedResource) {
        info!(resource = %resource.describe(), "Tracking created resource for cleanup");
        self.items.push(resource);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CreatedResource] {
        &self.items
    }

    /// The cluster now owns the dependencies; nothing is torn down from here on
    pub fn disarm(&mut self) {
        self.items.clear();
    }

    /// Tear everything down in reverse creation order. A failed teardown is
    /// logged and does not stop the others. Returns the number of failures.
    pub async fn compensate(self, provider: &Provider) -> usize {
        let mut failures = 0;
        for resource in self.items.iter().rev() {
            info!(resource = %resource.describe(), "Cleaning up");
            if let Err(e) = resource.tear_down(provider).await {
                warn!(resource = %resource.describe(), error = %e, "Cleanup failed");
                failures += 1;
            }
        }
        failures
    }
}
