//! Kubernetes health checks for freshly installed clusters

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::{HealthCheckRequest, HealthChecker, HealthTopology};
use crate::error::HealthError;
use crate::wait::{wait_for, WaitError, WaitOptions};

/// Readiness job every classic cluster runs after install
pub const CLUSTER_READY_JOB: &str = "osd-cluster-ready";
pub const CLUSTER_READY_NAMESPACE: &str = "openshift-monitoring";

/// Build a client for the cluster described by a kubeconfig file
pub async fn client_from_kubeconfig(path: &Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Failed to load kubeconfig")?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Transport hiccups are retried by the wait loop; API answers are not
fn retryable(error: &kube::Error) -> bool {
    !matches!(error, kube::Error::Api(_))
}

/// All nodes report Ready and at least `expected` of them exist
pub fn nodes_ready(nodes: &[Node], expected: u32) -> bool {
    if nodes.is_empty() || nodes.len() < expected as usize {
        return false;
    }
    nodes.iter().all(|node| {
        node.status
            .as_ref()
            .and_then(|status| status.conditions.as_ref())
            .and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
            .is_some_and(|ready| ready.status == "True")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Running,
    Succeeded,
    Failed,
}

pub fn job_outcome(job: &Job) -> JobOutcome {
    let conditions = job
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or_default();
    let holds = |kind: &str| conditions.iter().any(|c| c.type_ == kind && c.status == "True");

    if holds("Complete") {
        JobOutcome::Succeeded
    } else if holds("Failed") {
        JobOutcome::Failed
    } else {
        JobOutcome::Running
    }
}

/// [`HealthChecker`] talking to the cluster through its admin kubeconfig
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeHealthChecker;

impl KubeHealthChecker {
    async fn hosted_cluster_healthy(
        &self,
        client: &Client,
        expected: u32,
        options: WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<(), HealthError> {
        info!(expected_compute_nodes = expected, timeout_secs = options.timeout.as_secs(), "Waiting for hosted cluster nodes");
        let nodes: Api<Node> = Api::all(client.clone());

        wait_for("hosted cluster nodes ready", options, cancel, || {
            let nodes = nodes.clone();
            async move {
                match nodes.list(&ListParams::default()).await {
                    Ok(list) => Ok(nodes_ready(&list.items, expected)),
                    Err(e) if retryable(&e) => {
                        warn!(error = %e, "Failed to reach the API server, retrying");
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await
        .map_err(|source| HealthError::Wait {
            check: "hosted cluster health check",
            source,
        })?;

        info!("Hosted cluster health check finished successfully");
        Ok(())
    }

    async fn classic_cluster_healthy(
        &self,
        client: &Client,
        report_dir: &Path,
        options: WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<(), HealthError> {
        info!(job = CLUSTER_READY_JOB, timeout_secs = options.timeout.as_secs(), "Waiting for cluster readiness job");
        let jobs: Api<Job> = Api::namespaced(client.clone(), CLUSTER_READY_NAMESPACE);

        let waited = wait_for("cluster readiness job", options, cancel, || {
            let jobs = jobs.clone();
            async move {
                match jobs.get(CLUSTER_READY_JOB).await {
                    Ok(job) => Ok(job_outcome(&job) != JobOutcome::Running),
                    Err(e) if retryable(&e) => {
                        warn!(error = %e, "Failed to reach the API server, retrying");
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .await;

        let failed = match waited {
            Ok(()) => {
                let job = jobs.get(CLUSTER_READY_JOB).await.map_err(|e| HealthError::Wait {
                    check: "cluster readiness job",
                    source: WaitError::Check(e),
                })?;
                if job_outcome(&job) == JobOutcome::Succeeded {
                    info!(job = CLUSTER_READY_JOB, "Cluster readiness job finished successfully");
                    return Ok(());
                }
                None
            }
            Err(WaitError::Cancelled { what }) => {
                return Err(HealthError::Wait {
                    check: "cluster readiness job",
                    source: WaitError::Cancelled { what },
                })
            }
            Err(e) => Some(e),
        };

        let log_path = match save_job_log(client, CLUSTER_READY_JOB, report_dir).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(job = CLUSTER_READY_JOB, error = %format!("{:#}", e), "Failed to save job log");
                None
            }
        };

        Err(match failed {
            Some(source) => HealthError::Wait {
                check: "cluster readiness job",
                source,
            },
            None => HealthError::JobFailed {
                job: CLUSTER_READY_JOB.to_string(),
                log_path,
            },
        })
    }
}

/// Write the log of the job's single pod to `<report_dir>/<job>.log`
async fn save_job_log(client: &Client, job: &str, report_dir: &Path) -> Result<PathBuf> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), CLUSTER_READY_NAMESPACE);
    let list = pods
        .list(&ListParams::default().labels(&format!("job-name={}", job)))
        .await
        .context("Failed to list job pods")?;

    let [pod] = list.items.as_slice() else {
        anyhow::bail!("Expected one pod for job {}, found {}", job, list.items.len());
    };
    let pod_name = pod.metadata.name.clone().unwrap_or_default();

    let log = pods
        .logs(&pod_name, &LogParams::default())
        .await
        .with_context(|| format!("Failed to get logs of pod {}", pod_name))?;

    let path = report_dir.join(format!("{}.log", job));
    tokio::fs::write(&path, log)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(job = %job, path = %path.display(), "Saved job log");
    Ok(path)
}

#[async_trait]
impl HealthChecker for KubeHealthChecker {
    async fn cluster_healthy(
        &self,
        kubeconfig: &Path,
        request: &HealthCheckRequest,
        cancel: &CancellationToken,
    ) -> Result<(), HealthError> {
        let client = client_from_kubeconfig(kubeconfig)
            .await
            .map_err(|source| HealthError::Client {
                path: kubeconfig.to_path_buf(),
                source,
            })?;
        let options = WaitOptions::new(request.timeout).with_interval(request.interval);

        match &request.topology {
            HealthTopology::HostedControlPlane { expected_compute_nodes } => {
                self.hosted_cluster_healthy(&client, *expected_compute_nodes, options, cancel)
                    .await
            }
            HealthTopology::Classic { report_dir } => {
                self.classic_cluster_healthy(&client, report_dir, options, cancel)
                    .await
            }
        }
    }
}
