use anyhow::{Context, Result};
use rosaflow_orchestrations::activities::versions;
use rosaflow_orchestrations::collaborators::ResourceManager;
use rosaflow_orchestrations::ocm_client::OcmClient;

use crate::cli::Output;
use crate::config::Config;

/// Read-only queries only need the cluster manager API, not a logged-in `rosa`
fn client() -> Result<OcmClient> {
    let config = Config::load()?;
    OcmClient::new(config.environment, config.ocm).context("Failed to build the cluster manager client")
}

pub async fn run_regions(hosted_cp: bool, multi_az: bool, output: Output) -> Result<()> {
    let client = client()?;
    let regions = client
        .regions(hosted_cp, multi_az)
        .await
        .context("Failed to list regions")?;

    if output == Output::Json {
        println!("{}", serde_json::to_string_pretty(&regions)?);
        return Ok(());
    }

    println!("{:<16} {:<28} {:<8} {:<8} {:<8}", "ID", "NAME", "ENABLED", "HOSTED", "MULTI-AZ");
    println!("{}", "-".repeat(72));
    for region in &regions {
        println!(
            "{:<16} {:<28} {:<8} {:<8} {:<8}",
            region.id, region.display_name, region.enabled, region.supports_hypershift, region.supports_multi_az
        );
    }
    println!();
    println!("{} region(s) found", regions.len());

    Ok(())
}

pub async fn run_versions(
    channel_group: String,
    hosted_cp: bool,
    constraints: Vec<String>,
    output: Output,
) -> Result<()> {
    let client = client()?;
    let versions = versions::versions(&client, &channel_group, hosted_cp, &constraints)
        .await
        .context("Failed to list versions")?;

    if output == Output::Json {
        println!("{}", serde_json::to_string_pretty(&versions)?);
        return Ok(());
    }

    println!("{:<14} {:<10} {:<8} {:<8} {:<20}", "VERSION", "CHANNEL", "DEFAULT", "HOSTED", "END OF LIFE");
    println!("{}", "-".repeat(64));
    for version in &versions {
        let eol = version
            .end_of_life_timestamp
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:<10} {:<8} {:<8} {:<20}",
            version.raw_id, version.channel_group, version.default, version.hosted_control_plane_enabled, eol
        );
    }
    println!();
    println!("{} version(s) found", versions.len());
    Ok(())
}
