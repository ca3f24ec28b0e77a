use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;

use cli::{Args, Mode};

/// Log to stderr and to ~/.rosaflow/rosaflow.log
fn initialize_tracing() -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,rosaflow_orchestrations=debug".into());

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let log_dir = PathBuf::from(home).join(".rosaflow");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "rosaflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop and must live until exit
    std::mem::forget(guard);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    initialize_tracing()?;

    match args.mode {
        Mode::Create(create) => commands::cluster::run_create(create).await,
        Mode::Delete(delete) => commands::cluster::run_delete(delete).await,
        Mode::Regions {
            hosted_cp,
            multi_az,
            output,
        } => commands::catalog::run_regions(hosted_cp, multi_az, output).await,
        Mode::Versions {
            channel_group,
            hosted_cp,
            constraints,
            output,
        } => commands::catalog::run_versions(channel_group, hosted_cp, constraints, output).await,
    }
}
