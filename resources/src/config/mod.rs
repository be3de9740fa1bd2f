use serde::{Deserialize, Serialize};

use crate::objects::RoleTable;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DiscovererConfig {
    /// GCP project whose clusters are discovered. Required.
    pub gcp_project: String,
    /// Frequency that the cluster directory is polled.
    /// In seconds. Default: 30 sec
    pub poll_time: u64,
    /// Directory holding the per-cluster TLS material.
    /// Defaults to "/etc/prometheus/kube_sd_certs".
    pub certificate_store: String,
    /// Path of the Prometheus configuration file that is rewritten.
    /// Defaults to "/etc/prometheus/prometheus.yml".
    pub prometheus_config: String,
    /// Base URL of the Prometheus server, used for reloads.
    pub prometheus_endpoint: String,
    /// Base URL of the GKE API.
    pub directory_endpoint: String,
    /// OAuth2 bearer token sent to the GKE API, if any.
    pub access_token: Option<String>,
    /// Relabel rules per discovery role.
    pub roles: RoleTable,
}

impl Default for DiscovererConfig {
    fn default() -> Self {
        DiscovererConfig {
            gcp_project: String::new(),
            poll_time: 30,
            certificate_store: "/etc/prometheus/kube_sd_certs".to_string(),
            prometheus_config: "/etc/prometheus/prometheus.yml".to_string(),
            prometheus_endpoint: "http://localhost:9090".to_string(),
            directory_endpoint: "https://container.googleapis.com".to_string(),
            access_token: None,
            roles: RoleTable::default(),
        }
    }
}
