use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Snapshot of one cluster as reported by the cluster directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    /// Cluster name, unique within a project.
    pub name: String,
    /// Address of the Kubernetes API server, without scheme.
    pub endpoint: String,
    pub auth: ClusterAuth,
}

/// Authentication material of a cluster master.
/// Certificates and key are base64 encoded PEM, as the directory reports them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterAuth {
    pub ca_cert: String,
    pub client_cert: String,
    pub client_key: String,
    pub username: String,
    pub password: String,
}

/// Clusters the discoverer believes exist, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySet {
    clusters: HashMap<String, ClusterRecord>,
}

impl DiscoverySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClusterRecord> {
        self.clusters.get(name)
    }

    /// Insert a record, returning the one it replaced.
    pub fn insert(&mut self, record: ClusterRecord) -> Option<ClusterRecord> {
        self.clusters.insert(record.name.to_owned(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<ClusterRecord> {
        self.clusters.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.clusters.keys()
    }

    /// Cluster names in ascending order.
    pub fn sorted_names(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.clusters.keys().collect();
        names.sort();
        names
    }

}

impl FromIterator<ClusterRecord> for DiscoverySet {
    /// Later records win when names collide.
    fn from_iter<T: IntoIterator<Item = ClusterRecord>>(iter: T) -> Self {
        let mut set = DiscoverySet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}
