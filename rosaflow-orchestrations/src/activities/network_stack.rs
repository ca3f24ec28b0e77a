//! VPC provisioning and teardown through terraform

use std::path::Path;

use rosaflow_models::NetworkStack;
use tera::{Context as TeraContext, Tera};
use tracing::info;

use crate::collaborators::{InfraExecutor, InfraVars};
use crate::error::NetworkStackError;

const HOSTED_TEMPLATE: &str = include_str!("../templates/hcp-vpc.tf");
const PRIVATE_LINK_TEMPLATE: &str = include_str!("../templates/private-link-vpc.tf");

/// File the template is materialized into
pub const TEMPLATE_FILE: &str = "setup-vpc.tf";
/// Terraform state written by apply; destroy needs it
pub const STATE_FILE: &str = "terraform.tfstate";

const PRIVATE_SUBNET_OUTPUT: &str = "cluster-private-subnet";
const PUBLIC_SUBNET_OUTPUT: &str = "cluster-public-subnet";
const NODE_PRIVATE_SUBNET_OUTPUT: &str = "node-private-subnet";

/// What to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStackRequest<'a> {
    pub cluster_name: &'a str,
    pub region: &'a str,
    pub working_dir: &'a Path,
    pub hosted_cp: bool,
    pub private_link: bool,
    pub multi_az: bool,
    pub machine_cidr: &'a str,
}

/// Whether terraform has recorded state in `working_dir`
pub async fn has_state(working_dir: &Path) -> bool {
    tokio::fs::try_exists(working_dir.join(STATE_FILE))
        .await
        .unwrap_or(false)
}

/// Provision the VPC for a cluster and return its subnets.
///
/// Apply writes state as it goes, so a failure from apply onwards can leave
/// resources behind that [`delete`] removes.
pub async fn create(
    infra: &dyn InfraExecutor,
    request: &NetworkStackRequest<'_>,
) -> Result<NetworkStack, NetworkStackError> {
    check_parameters(request.cluster_name, request.region, request.working_dir)?;

    info!(
        cluster_name = %request.cluster_name,
        region = %request.region,
        working_dir = %request.working_dir.display(),
        "Creating network stack"
    );

    let rendered = render(request)?;
    tokio::fs::create_dir_all(request.working_dir)
        .await
        .map_err(|source| NetworkStackError::Io {
            path: request.working_dir.to_path_buf(),
            source,
        })?;
    let template_path = request.working_dir.join(TEMPLATE_FILE);
    tokio::fs::write(&template_path, rendered)
        .await
        .map_err(|source| NetworkStackError::Io {
            path: template_path.clone(),
            source,
        })?;

    let dir = request.working_dir;
    let vars = variables(request.cluster_name, request.region);
    infra.init(dir).await.map_err(infra_error("init"))?;
    infra.plan(dir, &vars).await.map_err(infra_error("plan"))?;
    infra.apply(dir).await.map_err(infra_error("apply"))?;
    let outputs = infra.output(dir).await.map_err(infra_error("output"))?;

    let subnet = |key: &'static str| {
        outputs
            .get(key)
            .map(subnet_value)
            .filter(|value| !value.is_empty())
    };
    let stack = NetworkStack {
        private_subnet: subnet(PRIVATE_SUBNET_OUTPUT).ok_or(NetworkStackError::MissingOutput(PRIVATE_SUBNET_OUTPUT))?,
        public_subnet: subnet(PUBLIC_SUBNET_OUTPUT).ok_or(NetworkStackError::MissingOutput(PUBLIC_SUBNET_OUTPUT))?,
        node_private_subnet: subnet(NODE_PRIVATE_SUBNET_OUTPUT).filter(|_| request.hosted_cp),
    };

    info!(cluster_name = %request.cluster_name, subnet_ids = %stack.subnet_ids(), "Network stack created");
    Ok(stack)
}

/// Destroy the VPC recorded in `working_dir`
pub async fn delete(
    infra: &dyn InfraExecutor,
    cluster_name: &str,
    region: &str,
    working_dir: &Path,
) -> Result<(), NetworkStackError> {
    check_parameters(cluster_name, region, working_dir)?;

    if !has_state(working_dir).await {
        return Err(NetworkStackError::MissingState(working_dir.to_path_buf()));
    }

    info!(
        cluster_name = %cluster_name,
        region = %region,
        working_dir = %working_dir.display(),
        "Deleting network stack"
    );

    let vars = variables(cluster_name, region);
    infra.init(working_dir).await.map_err(infra_error("init"))?;
    infra
        .destroy(working_dir, &vars)
        .await
        .map_err(infra_error("destroy"))?;

    info!(cluster_name = %cluster_name, "Network stack deleted");
    Ok(())
}

fn check_parameters(cluster_name: &str, region: &str, working_dir: &Path) -> Result<(), NetworkStackError> {
    if cluster_name.is_empty() {
        return Err(NetworkStackError::MissingParameter("a cluster name"));
    }
    if region.is_empty() {
        return Err(NetworkStackError::MissingParameter("a region"));
    }
    if working_dir.as_os_str().is_empty() {
        return Err(NetworkStackError::MissingParameter("a working directory"));
    }
    Ok(())
}

/// Hosted wins over private link when both are requested
fn render(request: &NetworkStackRequest<'_>) -> Result<String, NetworkStackError> {
    let template = match (request.hosted_cp, request.private_link) {
        (true, _) => HOSTED_TEMPLATE,
        (false, true) => PRIVATE_LINK_TEMPLATE,
        (false, false) => return Err(NetworkStackError::UnsupportedTopology),
    };

    let mut context = TeraContext::new();
    context.insert("az_count", &if request.multi_az { 3 } else { 1 });
    context.insert("machine_cidr", request.machine_cidr);

    Ok(Tera::one_off(template, &context, false)?)
}

fn variables(cluster_name: &str, region: &str) -> InfraVars {
    InfraVars::from([
        ("aws_region".to_string(), region.to_string()),
        ("cluster_name".to_string(), cluster_name.to_string()),
    ])
}

fn infra_error(step: &'static str) -> impl FnOnce(crate::error::RemoteError) -> NetworkStackError {
    move |source| NetworkStackError::Infra { step, source }
}

/// Subnet ids from an output value; lists are joined with commas
fn subnet_value(value: &serde_json::Value) -> String {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(subnet_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    };
    raw.replace('"', "")
}
