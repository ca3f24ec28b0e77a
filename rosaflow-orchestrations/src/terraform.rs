//! [`InfraExecutor`] backed by the terraform binary

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::{CommandRunner, CommandSpec, InfraExecutor, InfraVars};
use crate::error::RemoteError;
use crate::rosa_cli::parse_json;

/// Saved plan consumed by apply
const PLAN_FILE: &str = "tfplan";

#[derive(Debug, Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
}

/// Runs terraform inside the working directory. Credentials reach terraform
/// through the runner's environment.
pub struct TerraformExecutor {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl TerraformExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    async fn run<I, S>(&self, dir: &Path, args: I) -> Result<String, RemoteError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = CommandSpec::new(&self.binary).args(args).current_dir(dir);
        debug!(command = %command, dir = %dir.display(), "Running terraform");
        Ok(self.runner.run(&command).await?.stdout)
    }
}

fn var_args(vars: &InfraVars) -> Vec<String> {
    vars.iter()
        .flat_map(|(key, value)| ["-var".to_string(), format!("{}={}", key, value)])
        .collect()
}

#[async_trait]
impl InfraExecutor for TerraformExecutor {
    async fn init(&self, dir: &Path) -> Result<(), RemoteError> {
        self.run(dir, ["init", "-input=false", "-no-color"]).await?;
        Ok(())
    }

    async fn plan(&self, dir: &Path, vars: &InfraVars) -> Result<(), RemoteError> {
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
            format!("-out={}", PLAN_FILE),
        ];
        args.extend(var_args(vars));
        self.run(dir, args).await?;
        Ok(())
    }

    async fn apply(&self, dir: &Path) -> Result<(), RemoteError> {
        self.run(dir, ["apply", "-input=false", "-no-color", "-auto-approve", PLAN_FILE])
            .await?;
        Ok(())
    }

    async fn destroy(&self, dir: &Path, vars: &InfraVars) -> Result<(), RemoteError> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
            "-no-color".to_string(),
        ];
        args.extend(var_args(vars));
        self.run(dir, args).await?;
        Ok(())
    }

    async fn output(&self, dir: &Path) -> Result<BTreeMap<String, serde_json::Value>, RemoteError> {
        let stdout = self.run(dir, ["output", "-json"]).await?;
        let entries: BTreeMap<String, OutputEntry> = parse_json("terraform output", &stdout)?;
        Ok(entries
            .into_iter()
            .map(|(name, entry)| (name, entry.value))
            .collect())
    }
}
