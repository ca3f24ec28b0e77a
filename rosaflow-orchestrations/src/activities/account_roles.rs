//! Account role discovery, creation and deletion

use rosaflow_models::{AccountRoleKind, AccountRoles, Partition};
use serde::Deserialize;
use tracing::info;

use super::Resolved;
use crate::error::{AccountRolesError, RemoteError};
use crate::rosa_cli::RosaCli;

/// Roles in a set without hosted control plane variants
const BASE_ROLE_COUNT: usize = 4;
/// Roles in a set with hosted control plane variants
const FULL_ROLE_COUNT: usize = 7;

/// One row of `rosa list account-roles --output json`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
struct AccountRoleEntry {
    #[serde(rename = "RoleName")]
    role_name: String,
    #[serde(rename = "RoleARN")]
    role_arn: String,
    #[serde(rename = "Version", default)]
    version: String,
    #[serde(rename = "RoleType", default)]
    role_type: String,
}

/// Find the account roles for `prefix`/`version`, creating them when none exist
pub async fn resolve(
    rosa: &RosaCli,
    partition: Partition,
    prefix: &str,
    version: &str,
    channel_group: &str,
    hosted_cp: bool,
) -> Result<Resolved<AccountRoles>, AccountRolesError> {
    if let Some(roles) = lookup(rosa, partition, prefix, version, hosted_cp).await? {
        return Ok(Resolved::existing(roles));
    }
    let roles = create(rosa, partition, prefix, version, channel_group, hosted_cp).await?;
    Ok(Resolved::created(roles))
}

/// The complete role set for `prefix`/`version`, or `None` when no role exists yet
pub async fn lookup(
    rosa: &RosaCli,
    partition: Partition,
    prefix: &str,
    version: &str,
    hosted_cp: bool,
) -> Result<Option<AccountRoles>, AccountRolesError> {
    check_prefix(prefix)?;
    info!(prefix = %prefix, version = %version, "Checking whether account roles exist");

    let found = find(rosa, partition, prefix, version, hosted_cp).await?;
    if found.is_some() {
        info!(prefix = %prefix, version = %version, "Account roles already exist, skipping creation");
    }
    Ok(found)
}

/// Create the role set and read it back. Roles may exist even when this
/// fails after the create command was issued.
pub async fn create(
    rosa: &RosaCli,
    partition: Partition,
    prefix: &str,
    version: &str,
    channel_group: &str,
    hosted_cp: bool,
) -> Result<AccountRoles, AccountRolesError> {
    check_prefix(prefix)?;
    info!(prefix = %prefix, version = %version, channel_group = %channel_group, "Creating account roles");
    rosa.run([
        "create",
        "account-roles",
        "--prefix",
        prefix,
        "--version",
        version,
        "--channel-group",
        channel_group,
        "--mode",
        "auto",
        "--yes",
    ])
    .await?;

    let roles = find(rosa, partition, prefix, version, hosted_cp)
        .await?
        .ok_or_else(|| AccountRolesError::MissingAfterCreate {
            prefix: prefix.to_string(),
            version: version.to_string(),
        })?;

    info!(prefix = %prefix, version = %version, "Account roles created");
    Ok(roles)
}

/// Delete every account role carrying `prefix`
pub async fn delete(rosa: &RosaCli, prefix: &str) -> Result<(), AccountRolesError> {
    check_prefix(prefix)?;
    info!(prefix = %prefix, "Deleting account roles");

    match rosa
        .run(["delete", "account-roles", "--prefix", prefix, "--mode", "auto", "--yes"])
        .await
    {
        Ok(_) => {}
        Err(e) if mentions_no_roles(&e) => {
            info!(prefix = %prefix, "No account roles to delete");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    info!(prefix = %prefix, "Account roles deleted");
    Ok(())
}

/// An empty prefix would address every role in the account
fn check_prefix(prefix: &str) -> Result<(), AccountRolesError> {
    if prefix.trim().is_empty() {
        return Err(AccountRolesError::MissingPrefix);
    }
    Ok(())
}

fn mentions_no_roles(error: &RemoteError) -> bool {
    error
        .stderr()
        .is_some_and(|stderr| stderr.to_lowercase().contains("no account roles"))
}

/// `None` when no role matches; an error when only part of the set exists
async fn find(
    rosa: &RosaCli,
    partition: Partition,
    prefix: &str,
    version: &str,
    hosted_cp: bool,
) -> Result<Option<AccountRoles>, AccountRolesError> {
    let entries: Vec<AccountRoleEntry> = rosa
        .run_json("rosa list account-roles", ["list", "account-roles", "--output", "json"])
        .await?;

    let name_prefix = format!("{}-", prefix);
    let mut roles = AccountRoles::default();
    let mut found = 0;
    for entry in entries
        .iter()
        .filter(|e| e.role_name.starts_with(&name_prefix) && e.version == version)
    {
        if let Some(kind) = AccountRoleKind::classify(&entry.role_type, &entry.role_name) {
            *roles.slot_mut(kind) = Some(entry.role_arn.clone());
            found += 1;
        }
    }

    if found == 0 {
        return Ok(None);
    }
    check_cardinality(prefix, found, partition, hosted_cp, &roles)?;
    Ok(Some(roles))
}

/// A restricted partition has no hosted roles. A standard partition holds the
/// base set or the full set, and only the full set serves hosted clusters.
fn check_cardinality(
    prefix: &str,
    found: usize,
    partition: Partition,
    hosted_cp: bool,
    roles: &AccountRoles,
) -> Result<(), AccountRolesError> {
    let (ok, expected) = match partition {
        Partition::Restricted => (found == BASE_ROLE_COUNT && !roles.has_hosted_roles(), "4"),
        Partition::Standard if hosted_cp => (found == FULL_ROLE_COUNT, "7"),
        Partition::Standard => (found == BASE_ROLE_COUNT || found == FULL_ROLE_COUNT, "4 or 7"),
    };
    if ok {
        Ok(())
    } else {
        Err(AccountRolesError::Incomplete {
            prefix: prefix.to_string(),
            found,
            expected,
        })
    }
}
