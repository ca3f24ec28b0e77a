//! Cluster manager read API over HTTP
//!
//! Implements [`ResourceManager`] and [`KubeconfigProvider`] against the
//! `clusters_mgmt/v1` endpoints. Access tokens are exchanged at the
//! environment's SSO endpoint and cached until shortly before they expire.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rosaflow_models::{ClusterRecord, ClusterState, OcmEnvironment, OidcConfig, Region, Version};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::collaborators::{KubeconfigProvider, ResourceManager};
use crate::credentials::OcmCredentials;
use crate::error::RemoteError;
use crate::rosa_cli::parse_json;

const API_PREFIX: &str = "/api/clusters_mgmt/v1";
/// Client id the SSO endpoint expects for offline tokens
const OFFLINE_TOKEN_CLIENT_ID: &str = "cloud-services";
const PAGE_SIZE: &str = "500";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh this long before the access token expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClusterWire {
    id: String,
    name: String,
    state: ClusterState,
    hypershift: Option<Enabled>,
    region: Option<Reference>,
    nodes: Option<NodesWire>,
    aws: Option<AwsWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Enabled {
    enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Reference {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NodesWire {
    compute: u32,
    autoscale_compute: Option<AutoscaleWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AutoscaleWire {
    min_replicas: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AwsWire {
    sts: Option<StsWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StsWire {
    role_arn: Option<String>,
    operator_role_prefix: Option<String>,
    oidc_config: Option<Reference>,
}

impl From<ClusterWire> for ClusterRecord {
    fn from(wire: ClusterWire) -> Self {
        let sts = wire.aws.and_then(|aws| aws.sts).unwrap_or_default();
        let compute_nodes = wire
            .nodes
            .map(|nodes| match nodes.autoscale_compute {
                Some(autoscale) if nodes.compute == 0 => autoscale.min_replicas,
                _ => nodes.compute,
            })
            .unwrap_or_default();

        Self {
            id: wire.id,
            name: wire.name,
            state: wire.state,
            hosted_cp: wire.hypershift.is_some_and(|h| h.enabled),
            region: wire.region.map(|r| r.id).filter(|id| !id.is_empty()),
            compute_nodes,
            role_arn: sts.role_arn.filter(|arn| !arn.is_empty()),
            operator_role_prefix: sts.operator_role_prefix.filter(|p| !p.is_empty()),
            oidc_config_id: sts.oidc_config.map(|c| c.id).filter(|id| !id.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsWire {
    kubeconfig: String,
}

// ============================================================================
// Client
// ============================================================================

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct OcmClient {
    http: reqwest::Client,
    environment: OcmEnvironment,
    credentials: OcmCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl OcmClient {
    pub fn new(environment: OcmEnvironment, credentials: OcmCredentials) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            environment,
            credentials,
            token: Mutex::new(None),
        })
    }

    pub fn environment(&self) -> OcmEnvironment {
        self.environment
    }

    async fn access_token(&self) -> Result<String, RemoteError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!(token_url = %self.environment.token_url(), "Requesting access token");
        let form: Vec<(&str, &str)> = match &self.credentials {
            OcmCredentials::Token(token) => vec![
                ("grant_type", "refresh_token"),
                ("client_id", OFFLINE_TOKEN_CLIENT_ID),
                ("refresh_token", token.as_str()),
            ],
            OcmCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => vec![
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ],
        };

        let response = self
            .http
            .post(self.environment.token_url())
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = parse_json("token response", &body)?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        what: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let token = self.access_token().await?;
        let url = format!("{}{}{}", self.environment.url(), API_PREFIX, path);
        debug!(url = %url, "GET");

        let response = self.http.get(&url).bearer_auth(token).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Api {
                method: "GET",
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        parse_json(what, &body)
    }
}

/// Search expression matching a ROSA cluster by name or id
fn cluster_search(name_or_id: &str) -> String {
    let quoted = name_or_id.replace('\'', "''");
    format!("product.id = 'rosa' AND (name = '{0}' OR id = '{0}')", quoted)
}

fn version_search(channel_group: &str, hosted_cp: bool) -> String {
    let mut search = format!(
        "channel_group = '{}' AND enabled = 'true' AND rosa_enabled = 'true'",
        channel_group.replace('\'', "''")
    );
    if hosted_cp {
        search.push_str(" AND hosted_control_plane_enabled = 'true'");
    }
    search
}

#[async_trait]
impl ResourceManager for OcmClient {
    async fn regions(&self, hosted_cp: bool, multi_az: bool) -> Result<Vec<Region>, RemoteError> {
        let page: Page<Region> = self
            .get("regions", "/cloud_providers/aws/regions", &[("size", PAGE_SIZE)])
            .await?;
        Ok(page
            .items
            .into_iter()
            .filter(|r| (!hosted_cp || r.supports_hypershift) && (!multi_az || r.supports_multi_az))
            .collect())
    }

    async fn versions(&self, channel_group: &str, hosted_cp: bool) -> Result<Vec<Version>, RemoteError> {
        let search = version_search(channel_group, hosted_cp);
        let page: Page<Version> = self
            .get(
                "versions",
                "/versions",
                &[("search", search.as_str()), ("size", PAGE_SIZE), ("order", "default desc, id desc")],
            )
            .await?;
        Ok(page.items)
    }

    async fn oidc_configs(&self) -> Result<Vec<OidcConfig>, RemoteError> {
        let page: Page<OidcConfig> = self
            .get("oidc configs", "/oidc_configs", &[("size", PAGE_SIZE)])
            .await?;
        Ok(page.items)
    }

    async fn find_cluster(&self, name_or_id: &str) -> Result<Option<ClusterRecord>, RemoteError> {
        let search = cluster_search(name_or_id);
        let page: Page<ClusterWire> = self
            .get("clusters", "/clusters", &[("search", search.as_str()), ("size", "1")])
            .await?;
        Ok(page.items.into_iter().next().map(ClusterRecord::from))
    }
}

#[async_trait]
impl KubeconfigProvider for OcmClient {
    async fn kubeconfig_file(&self, cluster_id: &str, dir: &Path) -> Result<PathBuf, RemoteError> {
        let credentials: CredentialsWire = self
            .get("cluster credentials", &format!("/clusters/{}/credentials", cluster_id), &[])
            .await?;

        let path = dir.join(format!("{}-kubeconfig", cluster_id));
        let io_error = |source| RemoteError::Io {
            path: path.clone(),
            source,
        };
        tokio::fs::write(&path, credentials.kubeconfig).await.map_err(io_error)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_error)?;
        }

        info!(cluster_id = %cluster_id, path = %path.display(), "Wrote kubeconfig");
        Ok(path)
    }
}
