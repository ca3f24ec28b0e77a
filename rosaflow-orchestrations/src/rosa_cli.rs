//! Process execution and the `rosa` command line wrapper

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use rosaflow_models::OcmEnvironment;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::collaborators::{CommandOutput, CommandRunner, CommandSpec, CredentialSource};
use crate::credentials::OcmCredentials;
use crate::error::{CommandError, RemoteError};

/// Runs commands as child processes with credentials injected into their
/// environment. Children are killed when the running future is dropped.
pub struct ProcessRunner {
    credentials: Arc<dyn CredentialSource>,
    extra_env: Vec<(String, String)>,
}

impl ProcessRunner {
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            extra_env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        debug!(command = %spec.program, args = ?redacted_args(&spec.args), "Running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(self.credentials.env_vars())
            .envs(self.extra_env.iter().cloned())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CommandError::Failed {
                command: format!("{} {}", spec.program, redacted_args(&spec.args).join(" ")),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Hide values that follow secret flags
fn redacted_args(args: &[String]) -> Vec<&str> {
    const SECRET_FLAGS: [&str; 2] = ["--token", "--client-secret"];
    let mut hide_next = false;
    args.iter()
        .map(|arg| {
            let shown = if hide_next { "<redacted>" } else { arg.as_str() };
            hide_next = SECRET_FLAGS.contains(&arg.as_str());
            shown
        })
        .collect()
}

/// `rosa whoami` account details
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    #[serde(rename = "AWS Account ID")]
    pub aws_account_id: String,
    #[serde(rename = "AWS Default Region", default)]
    pub aws_default_region: String,
}

/// Thin typed wrapper over the `rosa` binary
#[derive(Clone)]
pub struct RosaCli {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl RosaCli {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.binary).args(args)
    }

    pub async fn run<I, S>(&self, args: I) -> Result<CommandOutput, RemoteError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self.runner.run(&self.command(args)).await?)
    }

    /// Run and decode stdout as JSON
    pub async fn run_json<T, I, S>(&self, what: &'static str, args: I) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let output = self.run(args).await?;
        parse_json(what, &output.stdout)
    }

    pub async fn whoami(&self) -> Result<AccountInfo, RemoteError> {
        self.run_json("rosa whoami", ["whoami", "-o", "json"]).await
    }

    /// Verify the credentials by logging in against the chosen environment
    pub async fn login(
        &self,
        credentials: &OcmCredentials,
        environment: OcmEnvironment,
        region: &str,
    ) -> Result<(), RemoteError> {
        let mut args = vec!["login".to_string()];
        args.extend(credentials.login_args());
        if environment.is_restricted() && matches!(credentials, OcmCredentials::ClientCredentials { .. }) {
            args.push("--govcloud".to_string());
        }
        args.extend([
            "--env".to_string(),
            environment.cli_name().to_string(),
            "--region".to_string(),
            region.to_string(),
        ]);
        self.run(args).await.map(|_| ())
    }

    pub async fn version(&self) -> Result<String, RemoteError> {
        let output = self.run(["version"]).await?;
        Ok(output.stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(what: &'static str, raw: &str) -> Result<T, RemoteError> {
    serde_json::from_str(raw.trim()).map_err(RemoteError::malformed(what))
}

/// Location of the cluster manager CLI config shared by `rosa` invocations
pub fn ocm_config_path() -> PathBuf {
    std::env::temp_dir().join("ocm.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[test]
    fn test_redacted_args_hide_secrets() {
        let args: Vec<String> = ["login", "--token", "abc", "--env", "stage"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            redacted_args(&args),
            vec!["login", "--token", "<redacted>", "--env", "stage"]
        );
    }

    #[tokio::test]
    async fn test_whoami_parses_account_info() {
        let runner = Arc::new(FakeRunner::new().respond(
            "whoami",
            r#"{"AWS Account ID": "123456789012", "AWS Default Region": "us-east-1", "OCM API": "https://api.openshift.com"}"#,
        ));
        let rosa = RosaCli::new(runner.clone(), "rosa");

        let info = rosa.whoami().await.unwrap();
        assert_eq!(info.aws_account_id, "123456789012");
        assert_eq!(runner.calls(), vec!["whoami -o json"]);
    }

    #[tokio::test]
    async fn test_malformed_output_is_a_remote_error() {
        let runner = Arc::new(FakeRunner::new().respond("whoami", "not json"));
        let rosa = RosaCli::new(runner, "rosa");

        let err = rosa.whoami().await.unwrap_err();
        assert!(matches!(err, RemoteError::Malformed { what: "rosa whoami", .. }));
    }

    #[tokio::test]
    async fn test_login_args_for_environment() {
        let runner = Arc::new(FakeRunner::new());
        let rosa = RosaCli::new(runner.clone(), "rosa");

        rosa.login(
            &OcmCredentials::Token("abc".to_string()),
            OcmEnvironment::Stage,
            "us-east-1",
        )
        .await
        .unwrap();

        assert_eq!(
            runner.calls(),
            vec!["login --token abc --env staging --region us-east-1"]
        );
    }
}
