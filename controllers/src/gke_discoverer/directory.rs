use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use resources::objects::{ClusterAuth, ClusterRecord};
use serde::Deserialize;

/// Source of truth for which clusters exist.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Every running cluster of the project, in one logical call.
    async fn list_clusters(&self, project: &str) -> Result<Vec<ClusterRecord>>;
}

/// Google Kubernetes Engine cluster listing across all locations.
pub struct GkeDirectory {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl GkeDirectory {
    pub fn new(endpoint: &str, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn clusters_url(&self, project: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/-/clusters",
            self.endpoint, project
        )
    }
}

#[async_trait]
impl ClusterDirectory for GkeDirectory {
    async fn list_clusters(&self, project: &str) -> Result<Vec<ClusterRecord>> {
        let url = self.clusters_url(project);
        let mut request = self.client.get(&url);
        if let Some(token) = self.access_token.as_ref() {
            request = request.bearer_auth(token);
        }
        let res = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("Cluster listing for project {} rejected", project))?
            .json::<ListClustersResponse>()
            .await
            .with_context(|| "Failed to parse cluster listing".to_string())?;
        res.into_records()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListClustersResponse {
    #[serde(default)]
    clusters: Vec<GkeCluster>,
    /// Locations that could not be reached.
    #[serde(default)]
    missing_zones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GkeCluster {
    name: String,
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    master_auth: MasterAuth,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct MasterAuth {
    username: String,
    password: String,
    cluster_ca_certificate: String,
    client_certificate: String,
    client_key: String,
}

impl ListClustersResponse {
    fn into_records(self) -> Result<Vec<ClusterRecord>> {
        // A partial listing would look like deleted clusters.
        if !self.missing_zones.is_empty() {
            bail!(
                "Cluster listing is incomplete, unreachable zones: {}",
                self.missing_zones.join(", ")
            );
        }

        Ok(self
            .clusters
            .into_iter()
            .filter(|cluster| {
                let running = !cluster.endpoint.is_empty()
                    && !matches!(cluster.status.as_str(), "PROVISIONING" | "STOPPING");
                if !running {
                    tracing::debug!(
                        "Ignoring cluster {} in state {}",
                        cluster.name,
                        cluster.status
                    );
                }
                running
            })
            .map(|cluster| ClusterRecord {
                name: cluster.name,
                endpoint: cluster.endpoint,
                auth: ClusterAuth {
                    ca_cert: cluster.master_auth.cluster_ca_certificate,
                    client_cert: cluster.master_auth.client_certificate,
                    client_key: cluster.master_auth.client_key,
                    username: cluster.master_auth.username,
                    password: cluster.master_auth.password,
                },
            })
            .collect())
    }
}
