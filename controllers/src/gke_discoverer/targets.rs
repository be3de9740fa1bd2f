use std::collections::BTreeMap;

use resources::objects::{
    BasicAuth, ClusterRecord, DiscoverySet, KubernetesSdConfig, RelabelConfig, Role, RoleTable,
    TargetGroup, TlsConfig,
};

use crate::credentials::CredentialPaths;

pub fn job_name(cluster: &str, role: Role) -> String {
    format!("kubernetes_{}_{}", cluster, role)
}

/// Build one target group per (cluster, role).
/// Only clusters with materialized credentials are included. Output is ordered
/// by cluster name, then by role.
pub fn build_target_groups(
    clusters: &DiscoverySet,
    credentials: &BTreeMap<String, CredentialPaths>,
    roles: &RoleTable,
) -> Vec<TargetGroup> {
    let mut groups = Vec::with_capacity(credentials.len() * roles.len());
    for (name, paths) in credentials.iter() {
        let cluster = match clusters.get(name) {
            Some(cluster) => cluster,
            None => continue,
        };
        let tls_config = TlsConfig::from(paths);
        for (role, relabel_configs) in roles.iter() {
            groups.push(target_group(
                cluster,
                *role,
                tls_config.to_owned(),
                relabel_configs.to_owned(),
            ));
        }
    }
    groups
}

fn target_group(
    cluster: &ClusterRecord,
    role: Role,
    tls_config: TlsConfig,
    relabel_configs: Vec<RelabelConfig>,
) -> TargetGroup {
    let basic_auth = if cluster.auth.username.is_empty() {
        None
    } else {
        Some(BasicAuth {
            username: cluster.auth.username.to_owned(),
            password: cluster.auth.password.to_owned(),
        })
    };

    TargetGroup {
        job_name: job_name(&cluster.name, role),
        kubernetes_sd_configs: vec![KubernetesSdConfig {
            api_servers: vec![format!("https://{}", cluster.endpoint)],
            role,
            in_cluster: false,
            tls_config,
        }],
        basic_auth,
        relabel_configs,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use resources::objects::ClusterAuth;

    use super::*;
    use crate::credentials::CertificateStore;

    fn cluster(name: &str, username: &str) -> ClusterRecord {
        ClusterRecord {
            name: name.to_string(),
            endpoint: format!("35.0.0.{}", name.len()),
            auth: ClusterAuth {
                username: username.to_string(),
                password: "hunter2".to_string(),
                ..Default::default()
            },
        }
    }

    fn two_roles() -> RoleTable {
        RoleTable::new(
            [
                (Role::Pod, vec![RelabelConfig::labelmap("__meta_kubernetes_pod_label_(.+)")]),
                (Role::Node, vec![]),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn inputs(names: &[&str]) -> (DiscoverySet, BTreeMap<String, CredentialPaths>) {
        let store = CertificateStore::new("/certs");
        let set: DiscoverySet = names.iter().map(|n| cluster(n, "admin")).collect();
        let credentials = names
            .iter()
            .map(|n| (n.to_string(), store.paths(n)))
            .collect();
        (set, credentials)
    }

    #[test]
    fn one_group_per_cluster_and_role() {
        let (set, credentials) = inputs(&["b", "a"]);
        let groups = build_target_groups(&set, &credentials, &two_roles());

        let jobs: Vec<&str> = groups.iter().map(|g| g.job_name.as_str()).collect();
        assert_eq!(
            jobs,
            vec![
                "kubernetes_a_node",
                "kubernetes_a_pod",
                "kubernetes_b_node",
                "kubernetes_b_pod"
            ]
        );
        let unique: HashSet<&str> = jobs.iter().copied().collect();
        assert_eq!(unique.len(), jobs.len());
    }

    #[test]
    fn group_contents() {
        let (set, credentials) = inputs(&["prod"]);
        let groups = build_target_groups(&set, &credentials, &two_roles());
        let pod = &groups[1];

        assert_eq!(pod.kubernetes_sd_configs[0].role, Role::Pod);
        assert_eq!(pod.kubernetes_sd_configs[0].api_servers, vec!["https://35.0.0.4"]);
        assert_eq!(pod.kubernetes_sd_configs[0].tls_config.ca_file, "/certs/prod-ca.pem");
        assert!(!pod.kubernetes_sd_configs[0].in_cluster);
        assert_eq!(pod.basic_auth.as_ref().unwrap().username, "admin");
        assert_eq!(pod.relabel_configs.len(), 1);
    }

    #[test]
    fn basic_auth_only_with_username() {
        let store = CertificateStore::new("/certs");
        let set: DiscoverySet = vec![cluster("a", "")].into_iter().collect();
        let credentials = [("a".to_string(), store.paths("a"))].into_iter().collect();

        let groups = build_target_groups(&set, &credentials, &two_roles());
        assert!(groups.iter().all(|g| g.basic_auth.is_none()));
    }

    #[test]
    fn clusters_without_credentials_are_skipped() {
        let (set, mut credentials) = inputs(&["a", "b"]);
        credentials.remove("a");

        let groups = build_target_groups(&set, &credentials, &two_roles());
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.job_name.starts_with("kubernetes_b_")));
    }

    #[test]
    fn output_is_deterministic() {
        let names = ["delta", "alpha", "charlie", "bravo", "echo"];
        let (set, credentials) = inputs(&names);
        let first = serde_yaml::to_string(&build_target_groups(
            &set,
            &credentials,
            &RoleTable::default(),
        ))
        .unwrap();

        let (set, credentials) = inputs(&["echo", "bravo", "alpha", "delta", "charlie"]);
        let second = serde_yaml::to_string(&build_target_groups(
            &set,
            &credentials,
            &RoleTable::default(),
        ))
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn two_clusters_two_roles() {
        let (set, credentials) = inputs(&["a", "b"]);
        assert_eq!(build_target_groups(&set, &credentials, &two_roles()).len(), 4);
    }
}
