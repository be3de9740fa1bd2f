use std::{
    collections::{btree_map::Iter, BTreeMap},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Kubernetes service discovery role, in the order target groups are emitted.
#[derive(
    Debug,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Node,
    Pod,
    Service,
    Endpoints,
    Ingress,
}

/// One Prometheus `relabel_configs` item.
/// Fields the discoverer does not model are kept in `extra` and written back as is.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RelabelConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

impl RelabelConfig {
    /// Drop targets whose `label` does not match `regex`.
    pub fn keep(label: &str, regex: &str) -> Self {
        Self {
            source_labels: vec![label.to_string()],
            regex: Some(regex.to_string()),
            action: Some("keep".to_string()),
            ..Default::default()
        }
    }

    pub fn replace(source_labels: &[&str], target_label: &str) -> Self {
        Self {
            source_labels: source_labels.iter().map(|l| l.to_string()).collect(),
            target_label: Some(target_label.to_string()),
            action: Some("replace".to_string()),
            ..Default::default()
        }
    }

    pub fn labelmap(regex: &str) -> Self {
        Self {
            regex: Some(regex.to_string()),
            action: Some("labelmap".to_string()),
            ..Default::default()
        }
    }

    pub fn with_regex(mut self, regex: &str) -> Self {
        self.regex = Some(regex.to_string());
        self
    }

    pub fn with_replacement(mut self, replacement: &str) -> Self {
        self.replacement = Some(replacement.to_string());
        self
    }
}

/// Relabel rules per discovery role.
/// Only roles present in the table get target groups.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(try_from = "BTreeMap<String, Vec<RelabelConfig>>")]
pub struct RoleTable(BTreeMap<Role, Vec<RelabelConfig>>);

impl TryFrom<BTreeMap<String, Vec<RelabelConfig>>> for RoleTable {
    type Error = String;

    fn try_from(rules: BTreeMap<String, Vec<RelabelConfig>>) -> Result<Self, Self::Error> {
        rules
            .into_iter()
            .map(|(role, rules)| {
                Role::from_str(&role)
                    .map(|role| (role, rules))
                    .map_err(|_| format!("unknown discovery role {}", role))
            })
            .collect::<Result<_, _>>()
            .map(RoleTable)
    }
}

impl RoleTable {
    pub fn new(rules: BTreeMap<Role, Vec<RelabelConfig>>) -> Self {
        Self(rules)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, role: Role) -> Option<&Vec<RelabelConfig>> {
        self.0.get(&role)
    }

    /// Iterate roles in declaration order.
    pub fn iter(&self) -> Iter<'_, Role, Vec<RelabelConfig>> {
        self.0.iter()
    }

    fn stock_rules(role: Role) -> Option<Vec<RelabelConfig>> {
        let rules = match role {
            Role::Node => vec![RelabelConfig::labelmap("__meta_kubernetes_node_label_(.+)")],
            Role::Pod => vec![
                RelabelConfig::keep("__meta_kubernetes_pod_annotation_prometheus_io_scrape", "true"),
                RelabelConfig::replace(
                    &["__meta_kubernetes_pod_annotation_prometheus_io_path"],
                    "__metrics_path__",
                )
                .with_regex("(.+)"),
                RelabelConfig::replace(
                    &["__address__", "__meta_kubernetes_pod_annotation_prometheus_io_port"],
                    "__address__",
                )
                .with_regex(r"([^:]+)(?::\d+)?;(\d+)")
                .with_replacement("$1:$2"),
                RelabelConfig::labelmap("__meta_kubernetes_pod_label_(.+)"),
                RelabelConfig::replace(&["__meta_kubernetes_namespace"], "kubernetes_namespace"),
                RelabelConfig::replace(&["__meta_kubernetes_pod_name"], "kubernetes_pod_name"),
            ],
            Role::Service => vec![
                RelabelConfig::keep(
                    "__meta_kubernetes_service_annotation_prometheus_io_probe",
                    "true",
                ),
                RelabelConfig::labelmap("__meta_kubernetes_service_label_(.+)"),
                RelabelConfig::replace(&["__meta_kubernetes_namespace"], "kubernetes_namespace"),
                RelabelConfig::replace(&["__meta_kubernetes_service_name"], "kubernetes_name"),
            ],
            Role::Endpoints => vec![
                RelabelConfig::keep(
                    "__meta_kubernetes_service_annotation_prometheus_io_scrape",
                    "true",
                ),
                RelabelConfig::replace(
                    &["__meta_kubernetes_service_annotation_prometheus_io_scheme"],
                    "__scheme__",
                )
                .with_regex("(https?)"),
                RelabelConfig::replace(
                    &["__meta_kubernetes_service_annotation_prometheus_io_path"],
                    "__metrics_path__",
                )
                .with_regex("(.+)"),
                RelabelConfig::replace(
                    &["__address__", "__meta_kubernetes_service_annotation_prometheus_io_port"],
                    "__address__",
                )
                .with_regex(r"([^:]+)(?::\d+)?;(\d+)")
                .with_replacement("$1:$2"),
                RelabelConfig::labelmap("__meta_kubernetes_service_label_(.+)"),
                RelabelConfig::replace(&["__meta_kubernetes_namespace"], "kubernetes_namespace"),
                RelabelConfig::replace(&["__meta_kubernetes_service_name"], "kubernetes_name"),
            ],
            Role::Ingress => return None,
        };
        Some(rules)
    }
}

impl Default for RoleTable {
    /// Node, pod, service and endpoints discovery with the stock Prometheus
    /// Kubernetes relabelling.
    fn default() -> Self {
        Self(
            Role::iter()
                .filter_map(|role| Self::stock_rules(role).map(|rules| (role, rules)))
                .collect(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ca_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cert_file: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_file: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// A `kubernetes_sd_configs` item.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct KubernetesSdConfig {
    pub api_servers: Vec<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_cluster: bool,
    #[serde(default)]
    pub tls_config: TlsConfig,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Scrape config generated for one (cluster, role) pair.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TargetGroup {
    pub job_name: String,
    pub kubernetes_sd_configs: Vec<KubernetesSdConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,
}

/// Anything that can sit in a `scrape_configs` list.
pub trait ScrapeEntry {
    /// Whether the entry declares at least one Kubernetes discovery source,
    /// which is what marks it as owned by the discoverer.
    fn has_discovery_source(&self) -> bool;
}

impl ScrapeEntry for TargetGroup {
    fn has_discovery_source(&self) -> bool {
        !self.kubernetes_sd_configs.is_empty()
    }
}

impl ScrapeEntry for Value {
    fn has_discovery_source(&self) -> bool {
        self.get("kubernetes_sd_configs")
            .and_then(Value::as_sequence)
            .map_or(false, |sources| !sources.is_empty())
    }
}
