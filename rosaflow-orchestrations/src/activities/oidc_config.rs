//! OIDC config discovery, creation and deletion

use rosaflow_models::{OidcConfig, Partition};
use serde::Deserialize;
use tracing::info;

use super::Resolved;
use crate::collaborators::ResourceManager;
use crate::error::OidcConfigError;
use crate::rosa_cli::RosaCli;

#[derive(Debug, Deserialize)]
struct CreatedOidcConfig {
    id: String,
}

/// Reuse the OIDC config created for `prefix`, or create one
pub async fn resolve(
    rosa: &RosaCli,
    resources: &dyn ResourceManager,
    partition: Partition,
    prefix: &str,
    installer_role_arn: &str,
) -> Result<Resolved<String>, OidcConfigError> {
    if prefix.is_empty() {
        return Err(OidcConfigError::MissingParameter("a prefix"));
    }
    if installer_role_arn.is_empty() {
        return Err(OidcConfigError::MissingParameter("an installer role arn"));
    }

    if let Some(existing) = lookup(resources, prefix).await? {
        info!(prefix = %prefix, oidc_config_id = %existing.id, "OIDC config already exists, skipping creation");
        return Ok(Resolved::existing(existing.id));
    }

    info!(prefix = %prefix, "Creating OIDC config");
    let mut args = vec!["create", "oidc-config", "--output", "json", "--mode", "auto", "--yes"];
    if !partition.is_restricted() {
        args.extend(["--managed=false", "--prefix", prefix, "--installer-role-arn", installer_role_arn]);
    }
    let created: CreatedOidcConfig = rosa.run_json("rosa create oidc-config", args).await?;

    info!(prefix = %prefix, oidc_config_id = %created.id, "OIDC config created");
    Ok(Resolved::created(created.id))
}

/// Delete an OIDC config. Failures are fatal to the caller.
pub async fn delete(rosa: &RosaCli, oidc_config_id: &str) -> Result<(), OidcConfigError> {
    info!(oidc_config_id = %oidc_config_id, "Deleting OIDC config");
    rosa.run([
        "delete",
        "oidc-config",
        "--mode",
        "auto",
        "--oidc-config-id",
        oidc_config_id,
        "--yes",
    ])
    .await?;
    info!(oidc_config_id = %oidc_config_id, "OIDC config deleted");
    Ok(())
}

/// Delete the OIDC identity provider of a cluster, addressed by its config
/// when known and by the cluster otherwise
pub async fn delete_provider(
    rosa: &RosaCli,
    cluster_id: &str,
    oidc_config_id: Option<&str>,
) -> Result<(), OidcConfigError> {
    info!(cluster_id = %cluster_id, oidc_config_id = ?oidc_config_id, "Deleting OIDC provider");

    let mut args = vec!["delete", "oidc-provider", "--mode", "auto", "--yes"];
    match oidc_config_id {
        Some(id) => args.extend(["--oidc-config-id", id]),
        None => args.extend(["--cluster", cluster_id]),
    }
    rosa.run(args).await?;

    info!(cluster_id = %cluster_id, "OIDC provider deleted");
    Ok(())
}

async fn lookup(resources: &dyn ResourceManager, prefix: &str) -> Result<Option<OidcConfig>, OidcConfigError> {
    Ok(resources
        .oidc_configs()
        .await?
        .into_iter()
        .find(|config| config.secret_arn.contains(prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeResources, FakeRunner};
    use std::sync::Arc;

    const INSTALLER: &str = "arn:aws:iam::123456789012:role/demo-HCP-ROSA-Installer-Role";

    #[tokio::test]
    async fn test_existing_config_is_reused() {
        let runner = Arc::new(FakeRunner::new());
        let rosa = RosaCli::new(runner.clone(), "rosa");
        let resources = FakeResources::new();
        resources.oidc_configs.lock().unwrap().push(OidcConfig {
            id: "existing".to_string(),
            secret_arn: "arn:aws:secretsmanager:us-east-1:1:secret:demo-oidc-private-key".to_string(),
            ..Default::default()
        });

        let resolved = resolve(&rosa, &resources, Partition::Standard, "demo", INSTALLER)
            .await
            .unwrap();
        assert_eq!(resolved, Resolved::existing("existing".to_string()));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmanaged_config_created_on_standard_partition() {
        let runner = Arc::new(FakeRunner::new().respond("create oidc-config", r#"{"id": "new-config"}"#));
        let rosa = RosaCli::new(runner.clone(), "rosa");

        let resolved = resolve(&rosa, &FakeResources::new(), Partition::Standard, "demo", INSTALLER)
            .await
            .unwrap();
        assert_eq!(resolved, Resolved::created("new-config".to_string()));
        assert_eq!(
            runner.calls(),
            vec![format!(
                "create oidc-config --output json --mode auto --yes --managed=false --prefix demo --installer-role-arn {}",
                INSTALLER
            )]
        );
    }

    #[tokio::test]
    async fn test_managed_config_created_on_restricted_partition() {
        let runner = Arc::new(FakeRunner::new().respond("create oidc-config", r#"{"id": "gov-config"}"#));
        let rosa = RosaCli::new(runner.clone(), "rosa");

        resolve(&rosa, &FakeResources::new(), Partition::Restricted, "demo", INSTALLER)
            .await
            .unwrap();
        assert_eq!(runner.calls(), vec!["create oidc-config --output json --mode auto --yes"]);
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let rosa = RosaCli::new(Arc::new(FakeRunner::new()), "rosa");
        let resources = FakeResources::new();
        assert!(matches!(
            resolve(&rosa, &resources, Partition::Standard, "", INSTALLER).await,
            Err(OidcConfigError::MissingParameter(_))
        ));
        assert!(matches!(
            resolve(&rosa, &resources, Partition::Standard, "demo", "").await,
            Err(OidcConfigError::MissingParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_provider_addresses_config_or_cluster() {
        let runner = Arc::new(FakeRunner::new());
        let rosa = RosaCli::new(runner.clone(), "rosa");

        delete_provider(&rosa, "abc", Some("cfg")).await.unwrap();
        delete_provider(&rosa, "abc", None).await.unwrap();
        assert_eq!(
            runner.calls(),
            vec![
                "delete oidc-provider --mode auto --yes --oidc-config-id cfg",
                "delete oidc-provider --mode auto --yes --cluster abc",
            ]
        );
    }
}
