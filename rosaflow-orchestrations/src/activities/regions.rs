//! Region capability checks and random region selection

use rand::seq::SliceRandom;
use tracing::info;

use crate::collaborators::ResourceManager;
use crate::error::RegionError;

/// Ensure `region` is offered and enabled for the requested topology
pub async fn region_check(
    resources: &dyn ResourceManager,
    region: &str,
    hosted_cp: bool,
    multi_az: bool,
) -> Result<(), RegionError> {
    info!(region = %region, hosted_cp, multi_az, "Checking region");

    let regions = resources.regions(hosted_cp, multi_az).await?;
    let found = regions
        .iter()
        .find(|r| r.id == region)
        .ok_or_else(|| RegionError::NotFound {
            region: region.to_string(),
            hosted_cp,
            multi_az,
        })?;

    if !found.enabled {
        return Err(RegionError::Disabled(region.to_string()));
    }

    info!(region = %region, "Region check passed");
    Ok(())
}

/// Pick one of the enabled regions at random
pub async fn select_random_region(resources: &dyn ResourceManager) -> Result<String, RegionError> {
    let mut enabled: Vec<String> = resources
        .regions(false, false)
        .await?
        .into_iter()
        .filter(|r| r.enabled)
        .map(|r| r.id)
        .collect();

    enabled.shuffle(&mut rand::thread_rng());
    let selected = enabled.into_iter().next().ok_or(RegionError::NoneEnabled)?;

    info!(region = %selected, "Selected random region");
    Ok(selected)
}
