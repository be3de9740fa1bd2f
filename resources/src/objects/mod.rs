pub mod cluster;
pub mod scrape_config;

pub use cluster::{ClusterAuth, ClusterRecord, DiscoverySet};
pub use scrape_config::{
    BasicAuth, KubernetesSdConfig, RelabelConfig, Role, RoleTable, ScrapeEntry, TargetGroup,
    TlsConfig,
};
