//! Version listing, constraint filtering and nightly availability

use std::time::Duration;

use rosaflow_models::Version;
use semver::VersionReq;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collaborators::ResourceManager;
use crate::error::VersionError;
use crate::wait::{wait_for, WaitError, WaitOptions};

/// Channel group whose builds show up some time after they are announced
pub const NIGHTLY_CHANNEL_GROUP: &str = "nightly";

/// How long to wait for a nightly build to be listed
pub const NIGHTLY_WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Keep the versions that satisfy at least one constraint.
///
/// Order follows `versions` and each version appears once. No constraints
/// keeps everything. A constraint or candidate that does not parse fails the
/// whole call.
pub fn filter_versions(versions: Vec<Version>, constraints: &[String]) -> Result<Vec<Version>, VersionError> {
    if constraints.is_empty() {
        return Ok(versions);
    }

    let requirements = constraints
        .iter()
        .map(|constraint| {
            VersionReq::parse(constraint).map_err(|source| VersionError::Constraint {
                constraint: constraint.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut kept = Vec::new();
    for version in versions {
        let parsed = parse_version(&version.raw_id)?;
        if requirements.iter().any(|req| req.matches(&parsed)) {
            kept.push(version);
        }
    }
    Ok(kept)
}

/// List the versions of a channel group, optionally filtered by constraints
pub async fn versions(
    resources: &dyn ResourceManager,
    channel_group: &str,
    hosted_cp: bool,
    constraints: &[String],
) -> Result<Vec<Version>, VersionError> {
    info!(channel_group = %channel_group, hosted_cp, "Listing versions");
    let all = resources.versions(channel_group, hosted_cp).await?;
    filter_versions(all, constraints)
}

/// Wait until the requested version shows up in its channel group
pub async fn wait_for_version(
    resources: &dyn ResourceManager,
    version: &str,
    channel_group: &str,
    hosted_cp: bool,
    options: WaitOptions,
    cancel: &CancellationToken,
) -> Result<(), WaitError<VersionError>> {
    info!(version = %version, channel_group = %channel_group, "Waiting for version to be available");

    wait_for(&format!("version {} in {}", version, channel_group), options, cancel, || async move {
        let available = resources.versions(channel_group, hosted_cp).await?;
        Ok::<_, VersionError>(available.iter().any(|v| v.id.contains(version)))
    })
    .await
}

/// Parse a version the way the cluster manager spells it
pub fn parse_version(raw: &str) -> Result<semver::Version, VersionError> {
    semver::Version::parse(raw.trim().trim_start_matches('v')).map_err(|source| VersionError::InvalidVersion {
        version: raw.to_string(),
        source,
    })
}

/// `major.minor` of a version, e.g. "4.14" for "4.14.3"
pub fn major_minor(raw: &str) -> Result<String, VersionError> {
    let version = parse_version(raw)?;
    Ok(format!("{}.{}", version.major, version.minor))
}

/// Whether upgrading from `current` to `target` crosses into a minor release
/// that needs a new gate agreement. Downgrades never do.
pub fn gate_agreement_required(current: &semver::Version, target: &semver::Version) -> bool {
    (target.major, target.minor) > (current.major, current.minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{version, FakeResources};

    fn raw_ids(versions: &[Version]) -> Vec<&str> {
        versions.iter().map(|v| v.raw_id.as_str()).collect()
    }

    fn candidates() -> Vec<Version> {
        ["4.12.0", "4.13.1", "4.14.0"].into_iter().map(version).collect()
    }

    #[test]
    fn test_tilde_constraint_keeps_matching_minor() {
        let kept = filter_versions(candidates(), &["~4.13".to_string()]).unwrap();
        assert_eq!(raw_ids(&kept), vec!["4.13.1"]);
    }

    #[test]
    fn test_constraints_are_or_ed_without_duplicates() {
        let kept = filter_versions(
            candidates(),
            &[">=4.13".to_string(), "~4.12".to_string(), "=4.13.1".to_string()],
        )
        .unwrap();
        assert_eq!(raw_ids(&kept), vec!["4.12.0", "4.13.1", "4.14.0"]);
    }

    #[test]
    fn test_no_constraints_keeps_everything() {
        assert_eq!(filter_versions(candidates(), &[]).unwrap().len(), 3);
    }

    #[test]
    fn test_bad_constraint_fails() {
        let err = filter_versions(candidates(), &["not a version".to_string()]).unwrap_err();
        assert!(matches!(err, VersionError::Constraint { .. }));
    }

    #[test]
    fn test_bad_candidate_fails() {
        let mut versions = candidates();
        versions.push(version("latest"));
        let err = filter_versions(versions, &["~4.13".to_string()]).unwrap_err();
        assert!(matches!(err, VersionError::InvalidVersion { .. }));
    }

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("4.14.3").unwrap(), "4.14");
        assert!(major_minor("four").is_err());
    }

    #[test]
    fn test_gate_agreement_rule() {
        let v = |s: &str| semver::Version::parse(s).unwrap();
        assert!(gate_agreement_required(&v("4.13.5"), &v("4.14.0")));
        assert!(!gate_agreement_required(&v("4.14.2"), &v("4.14.5")));
        assert!(!gate_agreement_required(&v("4.14.2"), &v("4.13.9")));
        assert!(gate_agreement_required(&v("4.14.2"), &v("5.0.0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nightly_wait_finds_listed_version() {
        let resources = FakeResources::new().with_versions(&["4.15.0-0.nightly-2024-01-01-000000"]);
        let cancel = CancellationToken::new();

        let result = wait_for_version(
            &resources,
            "4.15.0-0.nightly-2024-01-01-000000",
            NIGHTLY_CHANNEL_GROUP,
            false,
            WaitOptions::new(NIGHTLY_WAIT_TIMEOUT),
            &cancel,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nightly_wait_times_out() {
        let resources = FakeResources::new().with_versions(&["4.14.0"]);
        let cancel = CancellationToken::new();

        let result = wait_for_version(
            &resources,
            "4.15.0",
            NIGHTLY_CHANNEL_GROUP,
            false,
            WaitOptions::new(NIGHTLY_WAIT_TIMEOUT),
            &cancel,
        )
        .await;
        assert!(result.unwrap_err().is_timeout());
    }
}
